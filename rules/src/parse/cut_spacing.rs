//! Cut-layer spacing: classic `SPACING` and `LEF58_SPACING`.

use super::{ParseContext, finish};
use crate::constraint::*;
use crate::error::{Result, RuleError};
use crate::token::TokenStream;

/// `SPACING s [CENTERTOCENTER] [SAMENET] [LAYER name [STACK] | ADJACENTCUTS n WITHIN d
/// [EXCEPTSAMEPGNET] | PARALLELOVERLAP | AREA a]`
pub fn parse_cut_spacing(ts: &mut TokenStream, ctx: &ParseContext) -> Result<Constraint> {
    ts.expect_keyword("SPACING")?;
    let mut rule = CutSpacingRule {
        spacing: ts.expect_coord("cut spacing")?,
        ..CutSpacingRule::default()
    };
    rule.center_to_center = ts.eat("CENTERTOCENTER");
    rule.same_net = ts.eat("SAMENET");
    match ts.peek() {
        None => {}
        Some("LAYER") => {
            ts.next_token();
            let name = ts.expect_word("second layer")?;
            rule.second_layer = Some(ctx.cut_layer_named(&name)?);
            rule.stack = ts.eat("STACK");
        }
        Some("ADJACENTCUTS") => {
            ts.next_token();
            let count = ts.expect_count("adjacent cuts")?;
            ts.expect_keyword("WITHIN")?;
            let within = ts.expect_coord("cut within")?;
            if within < rule.spacing {
                log::warn!(
                    "cut spacing {} has ADJACENTCUTS within {} below the spacing",
                    rule.spacing,
                    within
                );
            }
            rule.adjacent_cuts = Some(AdjacentCuts {
                count,
                within,
                except_same_pg_net: ts.eat("EXCEPTSAMEPGNET"),
            });
        }
        Some("PARALLELOVERLAP") => {
            ts.next_token();
            rule.parallel_overlap = true;
        }
        Some("AREA") => {
            ts.next_token();
            rule.area = Some(ts.expect_area("cut area")?);
        }
        Some(_) => return Err(ts.unsupported("cut SPACING")),
    }
    finish(ts, "cut SPACING")?;
    Ok(Constraint::CutSpacing(rule))
}

/// `LEF58_SPACING` on a cut layer. The `LAYER` and `ADJACENTCUTS` branches are compiled.
pub fn parse_lef58_cut_spacing(ts: &mut TokenStream, ctx: &ParseContext) -> Result<Constraint> {
    ts.expect_keyword("SPACING")?;
    let spacing = ts.expect_coord("cut spacing")?;
    let (mut same_mask, mut max_xy, mut c2c) = (false, false, false);
    let (mut same_net, mut same_metal, mut same_via) = (false, false, false);
    loop {
        match ts.peek() {
            Some("SAMEMASK") => same_mask = true,
            Some("MAXXY") => max_xy = true,
            Some("CENTERTOCENTER") => c2c = true,
            Some("SAMENET") => same_net = true,
            Some("SAMEMETAL") => same_metal = true,
            Some("SAMEVIA") => same_via = true,
            _ => break,
        }
        ts.next_token();
    }
    let branch = match ts.peek() {
        Some("LAYER") => {
            ts.next_token();
            Lef58CutBranch::Layer(parse_layer_branch(ts, ctx)?)
        }
        Some("ADJACENTCUTS") => {
            ts.next_token();
            Lef58CutBranch::AdjacentCuts(parse_adjacent_cuts_branch(ts, ctx)?)
        }
        _ => return Err(ts.unsupported("LEF58_SPACING cut")),
    };
    finish(ts, "LEF58_SPACING cut")?;
    Ok(Constraint::Lef58CutSpacing(Lef58CutSpacingRule {
        spacing,
        same_mask,
        max_xy,
        center_to_center: c2c,
        same_net,
        same_metal,
        same_via,
        branch,
    }))
}

fn parse_layer_branch(ts: &mut TokenStream, ctx: &ParseContext) -> Result<LayerBranch> {
    let name = ts.expect_word("second layer")?;
    let mut branch = LayerBranch {
        second_layer: ctx.layer_named(&name)?,
        stack: false,
        orthogonal_spacing: None,
        cut_class: None,
    };
    match ts.peek() {
        Some("STACK") => {
            ts.next_token();
            branch.stack = true;
        }
        Some("ORTHOGONALSPACING") => {
            ts.next_token();
            branch.orthogonal_spacing = Some(ts.expect_coord("orthogonal spacing")?);
        }
        Some("CUTCLASS") => {
            ts.next_token();
            let class = ts.expect_word("cut class")?;
            ctx.require_cut_class(&class)?;
            let mode = parse_cut_class_mode(ts)?;
            branch.cut_class = Some((class, mode));
        }
        _ => {}
    }
    Ok(branch)
}

fn parse_cut_class_mode(ts: &mut TokenStream) -> Result<CutClassMode> {
    let Some(kw) = ts.peek() else {
        return Ok(CutClassMode::Plain);
    };
    let mode = match kw {
        "SHORTEDGEONLY" => {
            ts.next_token();
            let prl = if ts.eat("PRL") {
                Some(ts.expect_coord("prl")?)
            } else {
                None
            };
            CutClassMode::ShortEdgeOnly { prl }
        }
        "CONCAVECORNER" => {
            ts.next_token();
            CutClassMode::ConcaveCorner(parse_concave_corner(ts)?)
        }
        "EXTENSION" => {
            ts.next_token();
            CutClassMode::Extension(ts.expect_coord("extension")?)
        }
        "NONEOLCONVEXCORNER" => {
            ts.next_token();
            let eol_width = ts.expect_coord("eol width")?;
            let min_length = if ts.eat("MINLENGTH") {
                Some(ts.expect_coord("min length")?)
            } else {
                None
            };
            CutClassMode::NonEolConvexCorner {
                eol_width,
                min_length,
            }
        }
        "ABOVEWIDTH" => {
            ts.next_token();
            let width = ts.expect_coord("above width")?;
            let enclosure = if ts.eat("ENCLOSURE") {
                Some(ts.expect_coord("enclosure")?)
            } else {
                None
            };
            CutClassMode::AboveWidth { width, enclosure }
        }
        "MASKOVERLAP" => {
            ts.next_token();
            CutClassMode::MaskOverlap
        }
        "WRONGDIRECTION" => {
            ts.next_token();
            CutClassMode::WrongDirection
        }
        _ => return Err(ts.unsupported("LEF58_SPACING CUTCLASS")),
    };
    Ok(mode)
}

/// `CONCAVECORNER` needs exactly one of its three sub-forms.
fn parse_concave_corner(ts: &mut TokenStream) -> Result<ConcaveCornerCut> {
    match ts.next_token() {
        Some("WIDTH") => {
            let width = ts.expect_coord("width")?;
            ts.expect_keyword("ENCLOSURE")?;
            let enclosure = ts.expect_coord("enclosure")?;
            ts.expect_keyword("EDGELENGTH")?;
            let edge_length = ts.expect_coord("edge length")?;
            Ok(ConcaveCornerCut::Width {
                width,
                enclosure,
                edge_length,
            })
        }
        Some("PARALLEL") => {
            let par_length = ts.expect_coord("parallel length")?;
            ts.expect_keyword("WITHIN")?;
            let par_within = ts.expect_coord("parallel within")?;
            ts.expect_keyword("ENCLOSURE")?;
            let enclosure = ts.expect_coord("enclosure")?;
            Ok(ConcaveCornerCut::Parallel {
                par_length,
                par_within,
                enclosure,
            })
        }
        Some("EDGELENGTH") => {
            let edge_length = ts.expect_coord("edge length")?;
            ts.expect_keyword("ENCLOSURE")?;
            let edge_enclosure = ts.expect_coord("edge enclosure")?;
            let adj_enclosure = ts.expect_coord("adjacent enclosure")?;
            Ok(ConcaveCornerCut::EdgeLength {
                edge_length,
                edge_enclosure,
                adj_enclosure,
            })
        }
        Some(other) => Err(RuleError::Expected {
            expected: "WIDTH, PARALLEL or EDGELENGTH",
            found: other.to_string(),
        }),
        None => Err(RuleError::UnexpectedEnd {
            expected: "CONCAVECORNER form",
        }),
    }
}

fn parse_adjacent_cuts_branch(
    ts: &mut TokenStream,
    ctx: &ParseContext,
) -> Result<AdjacentCutsBranch> {
    let mut b = AdjacentCutsBranch {
        cuts: ts.expect_count("adjacent cuts")?,
        ..AdjacentCutsBranch::default()
    };
    let mut has_within = false;
    while let Some(kw) = ts.peek() {
        match kw {
            "EXACTALIGNED" => {
                ts.next_token();
                b.exact_aligned = Some(ts.expect_count("exact aligned")?);
            }
            "TWOCUTS" => {
                ts.next_token();
                b.two_cuts = Some(ts.expect_count("two cuts")?);
                loop {
                    if ts.eat("TWOCUTSSPACING") {
                        b.two_cuts_spacing = Some(ts.expect_coord("two cuts spacing")?);
                    } else if ts.eat("SAMECUT") {
                        b.same_cut = true;
                    } else {
                        break;
                    }
                }
            }
            "WITHIN" => {
                ts.next_token();
                b.within = ts.expect_coord("cut within")?;
                b.within2 = ts.opt_coord("cut within")?;
                has_within = true;
            }
            "EXCEPTSAMEPGNET" => {
                ts.next_token();
                b.except_same_pg_net = true;
            }
            "EXCEPTALLWITHIN" => {
                ts.next_token();
                b.except_all_within = Some(ts.expect_coord("except all within")?);
            }
            "ENCLOSURE" => {
                ts.next_token();
                let side = if ts.eat("ABOVE") {
                    EnclosureSide::Above
                } else if ts.eat("BELOW") {
                    EnclosureSide::Below
                } else {
                    EnclosureSide::Either
                };
                b.enclosure = Some((side, ts.expect_coord("enclosure")?));
            }
            "CUTCLASS" => {
                ts.next_token();
                let class = ts.expect_word("cut class")?;
                ctx.require_cut_class(&class)?;
                b.cut_class = Some(class);
                if ts.peek() == Some("TO") && ts.peek_at(1) == Some("ALL") {
                    ts.next_token();
                    ts.next_token();
                    b.to_all = true;
                }
            }
            "NOPRL" => {
                ts.next_token();
                b.no_prl = true;
            }
            "SIDEPARALLELOVERLAP" => {
                ts.next_token();
                b.side_parallel_overlap = true;
            }
            "SAMEMASK" => {
                ts.next_token();
                b.same_mask = true;
            }
            _ => return Err(ts.unsupported("ADJACENTCUTS")),
        }
    }
    if !has_within {
        return Err(RuleError::UnexpectedEnd {
            expected: "ADJACENTCUTS WITHIN",
        });
    }
    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_util::{stmt, tech};
    use vroute_common::db::indices::LayerId;

    fn classes() -> Vec<CutClass> {
        vec![CutClass {
            name: "VA".into(),
            via_width: 50,
            via_length: 50,
            num_cuts: 1,
        }]
    }

    #[test]
    fn classic_adjacent_cuts() {
        let tech = tech();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(1),
            cut_classes: &[],
        };
        let c = parse_cut_spacing(
            &mut stmt("SPACING 80 CENTERTOCENTER ADJACENTCUTS 3 WITHIN 100 EXCEPTSAMEPGNET ;"),
            &ctx,
        )
        .unwrap();
        let Constraint::CutSpacing(r) = c else {
            panic!("expected cut spacing")
        };
        assert!(r.center_to_center);
        assert_eq!(
            r.adjacent_cuts,
            Some(AdjacentCuts {
                count: 3,
                within: 100,
                except_same_pg_net: true
            })
        );
    }

    #[test]
    fn classic_second_layer_must_be_cut() {
        let tech = tech();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(3),
            cut_classes: &[],
        };
        let ok = parse_cut_spacing(&mut stmt("SPACING 80 LAYER V1 STACK ;"), &ctx).unwrap();
        assert!(matches!(ok, Constraint::CutSpacing(CutSpacingRule { stack: true, .. })));
        assert!(parse_cut_spacing(&mut stmt("SPACING 80 LAYER M2 ;"), &ctx).is_err());
        assert!(matches!(
            parse_cut_spacing(&mut stmt("SPACING 80 LAYER V9 ;"), &ctx),
            Err(RuleError::UnknownLayer(_))
        ));
    }

    #[test]
    fn lef58_layer_branch_concave_corner() {
        let tech = tech();
        let classes = classes();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(3),
            cut_classes: &classes,
        };
        let text = "SPACING 100 LAYER V1 CUTCLASS VA CONCAVECORNER PARALLEL 40 WITHIN 60 ENCLOSURE 10 ;";
        let Constraint::Lef58CutSpacing(r) = parse_lef58_cut_spacing(&mut stmt(text), &ctx).unwrap()
        else {
            panic!("expected LEF58 cut spacing")
        };
        let Lef58CutBranch::Layer(b) = r.branch else {
            panic!("expected layer branch")
        };
        assert_eq!(b.second_layer, LayerId(1));
        assert_eq!(
            b.cut_class,
            Some((
                "VA".to_string(),
                CutClassMode::ConcaveCorner(ConcaveCornerCut::Parallel {
                    par_length: 40,
                    par_within: 60,
                    enclosure: 10
                })
            ))
        );
    }

    #[test]
    fn concave_corner_without_form_is_an_error() {
        let tech = tech();
        let classes = classes();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(3),
            cut_classes: &classes,
        };
        let text = "SPACING 100 LAYER V1 CUTCLASS VA CONCAVECORNER ;";
        assert!(parse_lef58_cut_spacing(&mut stmt(text), &ctx).is_err());
    }

    #[test]
    fn lef58_adjacent_cuts_branch() {
        let tech = tech();
        let classes = classes();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(1),
            cut_classes: &classes,
        };
        let text = "SPACING 90 CENTERTOCENTER ADJACENTCUTS 2 EXACTALIGNED 1 TWOCUTS 1 SAMECUT \
                    WITHIN 100 120 ENCLOSURE ABOVE 5 CUTCLASS VA TO ALL NOPRL SAMEMASK ;";
        let Constraint::Lef58CutSpacing(r) = parse_lef58_cut_spacing(&mut stmt(text), &ctx).unwrap()
        else {
            panic!("expected LEF58 cut spacing")
        };
        assert!(r.center_to_center);
        let Lef58CutBranch::AdjacentCuts(b) = r.branch else {
            panic!("expected adjacent cuts branch")
        };
        assert_eq!((b.cuts, b.exact_aligned, b.two_cuts), (2, Some(1), Some(1)));
        assert!(b.same_cut && b.to_all && b.no_prl && b.same_mask);
        assert_eq!((b.within, b.within2), (100, Some(120)));
        assert_eq!(b.enclosure, Some((EnclosureSide::Above, 5)));
    }

    #[test]
    fn unknown_cut_class_drops_rule() {
        let tech = tech();
        let ctx = ParseContext {
            tech: &tech,
            layer: LayerId(1),
            cut_classes: &[],
        };
        let text = "SPACING 90 ADJACENTCUTS 2 WITHIN 100 CUTCLASS VX ;";
        assert_eq!(
            parse_lef58_cut_spacing(&mut stmt(text), &ctx),
            Err(RuleError::UnknownCutClass("VX".into()))
        );
    }
}
