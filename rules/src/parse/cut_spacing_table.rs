//! `LEF58_SPACINGTABLE` on a cut layer: spacing by cut class pair.

use super::ParseContext;
use crate::constraint::*;
use crate::error::{Result, RuleError};
use crate::table::Lookup2D;
use crate::token::{TokenStream, is_number};
use vroute_common::geom::Coord;

/// Options that are read past without being compiled.
const IGNORED_OPTIONS: &[&str] = &[
    "SAMEMASK",
    "SAMENET",
    "SAMEMETAL",
    "SAMEVIA",
    "CENTERTOCENTER",
    "CENTERANDEDGE",
    "PRLTWOSIDES",
    "ENDEXTENSION",
    "EXACTALIGNEDSPACING",
    "NONOPPOSITEENCLOSURESPACING",
    "OPPOSITEENCLOSURERESIZESPACING",
];

fn is_option(t: &str) -> bool {
    matches!(t, "DEFAULT" | "LAYER" | "PRL" | "CUTCLASS") || IGNORED_OPTIONS.contains(&t)
}

pub fn parse_cut_spacing_table(ts: &mut TokenStream, ctx: &ParseContext) -> Result<Constraint> {
    ts.expect_keyword("SPACINGTABLE")?;
    if let Some(kw @ ("CENTERSPACING" | "ORTHOGONAL")) = ts.peek() {
        return Err(RuleError::Unsupported(format!("{} cut spacing table", kw)));
    }

    let mut default_spacing = None;
    let mut second_layer = None;
    let mut nonzero_enclosure = false;
    let mut prl = None;
    loop {
        match ts.peek() {
            Some("DEFAULT") => {
                ts.next_token();
                default_spacing = Some(ts.expect_coord("default cut spacing")?);
            }
            Some("LAYER") => {
                ts.next_token();
                let name = ts.expect_word("second layer")?;
                if ctx.is_first_cut_layer() {
                    return Err(RuleError::Unsupported(
                        "LAYER cut spacing table on the lowest cut layer".into(),
                    ));
                }
                second_layer = Some(ctx.layer_named(&name)?);
                nonzero_enclosure = ts.eat("NONZEROENCLOSURE");
            }
            Some("PRL") => {
                ts.next_token();
                let length = ts.expect_coord("cut prl")?;
                let dir = if ts.eat("HORIZONTAL") {
                    PrlDirection::Horizontal
                } else if ts.eat("VERTICAL") {
                    PrlDirection::Vertical
                } else if ts.eat("MAXXY") {
                    PrlDirection::MaxXY
                } else {
                    PrlDirection::Any
                };
                prl = Some((length, dir));
            }
            Some("CUTCLASS") => {
                ts.next_token();
                break;
            }
            Some(kw) if IGNORED_OPTIONS.contains(&kw) => {
                log::debug!("cut spacing table option {} is not checked", kw);
                ts.next_token();
                while ts.peek().is_some_and(|t| !is_option(t)) {
                    ts.next_token();
                }
            }
            Some(_) => return Err(ts.unsupported("LEF58_SPACINGTABLE cut")),
            None => {
                return Err(RuleError::UnexpectedEnd {
                    expected: "CUTCLASS",
                });
            }
        }
    }

    let table = parse_class_table(ts, default_spacing.unwrap_or(0))?;
    Ok(Constraint::CutClassSpacingTable(CutSpacingTableRule {
        default_spacing,
        second_layer,
        nonzero_enclosure,
        prl,
        table,
    }))
}

/// A table label and the edge it names, `None` meaning both edges.
type Label = (String, Option<CutEdge>);

fn read_label(ts: &mut TokenStream) -> Result<Label> {
    let name = ts.expect_word("cut class label")?;
    let edge = if ts.eat("SIDE") {
        Some(CutEdge::Side)
    } else if ts.eat("END") {
        Some(CutEdge::End)
    } else {
        None
    };
    Ok((name, edge))
}

fn is_value(t: &str) -> bool {
    t == "-" || is_number(t)
}

fn read_value(ts: &mut TokenStream, default: Coord) -> Result<Coord> {
    if ts.eat("-") {
        Ok(default)
    } else {
        ts.expect_coord("cut class spacing")
    }
}

fn expand(labels: &[Label]) -> Vec<(CutClassKey, usize)> {
    let mut out = Vec::new();
    for (i, (name, edge)) in labels.iter().enumerate() {
        match edge {
            Some(e) => out.push((CutClassKey::new(name.clone(), *e), i)),
            None => {
                out.push((CutClassKey::new(name.clone(), CutEdge::Side), i));
                out.push((CutClassKey::new(name.clone(), CutEdge::End), i));
            }
        }
    }
    out
}

/// Column labels come first. The header ends at the first label that is followed by
/// values, which is the first row. A label without `SIDE` or `END` stands for both edges
/// and is expanded into two labels before both axes are sorted.
fn parse_class_table(
    ts: &mut TokenStream,
    default: Coord,
) -> Result<Lookup2D<CutClassKey, CutClassKey, (Coord, Coord)>> {
    let mut header: Vec<Label> = Vec::new();
    loop {
        if ts.is_done() {
            return Err(RuleError::UnexpectedEnd {
                expected: "cut class table row",
            });
        }
        let label = read_label(ts)?;
        if ts.peek().is_some_and(is_value) {
            header.push(label);
            break;
        }
        header.push(label);
    }
    // The last label read belongs to the first row.
    let first_row = header.pop().ok_or(RuleError::UnexpectedEnd {
        expected: "cut class columns",
    })?;
    if header.is_empty() {
        return Err(RuleError::Invalid("cut class table has no columns".into()));
    }

    let mut row_labels = vec![first_row];
    let mut raw: Vec<Vec<(Coord, Coord)>> = Vec::new();
    loop {
        let mut row = Vec::with_capacity(header.len());
        for _ in 0..header.len() {
            let a = read_value(ts, default)?;
            let b = read_value(ts, default)?;
            row.push((a, b));
        }
        raw.push(row);
        if ts.is_done() {
            break;
        }
        row_labels.push(read_label(ts)?);
    }

    let cols = expand(&header);
    let rows = expand(&row_labels);
    let values = rows
        .iter()
        .map(|&(_, ri)| cols.iter().map(|&(_, ci)| raw[ri][ci]).collect())
        .collect();
    Lookup2D::from_unsorted(
        "CUTCLASS",
        rows.into_iter().map(|(k, _)| k).collect(),
        "CUTCLASS",
        cols.into_iter().map(|(k, _)| k).collect(),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_util::{stmt, tech};
    use vroute_common::db::indices::LayerId;

    fn ctx(tech: &vroute_common::db::core::Tech, layer: u32) -> ParseContext<'_> {
        ParseContext {
            tech,
            layer: LayerId(layer),
            cut_classes: &[],
        }
    }

    fn table(c: Constraint) -> CutSpacingTableRule {
        match c {
            Constraint::CutClassSpacingTable(r) => r,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn side_end_expansion_and_sort() {
        let tech = tech();
        let text = "SPACINGTABLE DEFAULT 70 PRL 10 MAXXY CUTCLASS VB VA SIDE VA END \
                    VB 100 110 80 90 85 95 \
                    VA 120 130 - 75 60 65 ;";
        let r = table(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 1)).unwrap());
        assert_eq!(r.default_spacing, Some(70));
        assert_eq!(r.prl, Some((10, PrlDirection::MaxXY)));
        assert_eq!(r.table.rows().len(), 4);
        assert_eq!(r.table.cols().len(), 4);
        assert!(r.table.cols().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(r.spacing("VA", CutEdge::End, "VA", CutEdge::Side), Some((70, 75)));
        assert_eq!(r.spacing("VA", CutEdge::Side, "VA", CutEdge::End), Some((60, 65)));
        assert_eq!(r.spacing("VB", CutEdge::End, "VB", CutEdge::Side), Some((100, 110)));
        assert_eq!(r.spacing("VB", CutEdge::Side, "VA", CutEdge::End), Some((85, 95)));
        assert_eq!(r.spacing("VC", CutEdge::Side, "VA", CutEdge::End), None);
    }

    #[test]
    fn layer_table_on_first_cut_layer_is_skipped() {
        let tech = tech();
        let text = "SPACINGTABLE LAYER V2 CUTCLASS VA VA 100 100 ;";
        assert!(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 1))
            .unwrap_err()
            .is_unsupported());
        let r = table(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 3)).unwrap());
        assert_eq!(r.second_layer, Some(LayerId(3)));
    }

    #[test]
    fn center_spacing_is_skipped() {
        let tech = tech();
        let text = "SPACINGTABLE CENTERSPACING CUTCLASS VA VA 100 ;";
        assert!(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 3))
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn short_row_is_an_error() {
        let tech = tech();
        let text = "SPACINGTABLE CUTCLASS VA VB VA 100 100 ;";
        assert!(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 3)).is_err());
    }

    #[test]
    fn ignored_options_are_read_past() {
        let tech = tech();
        let text = "SPACINGTABLE DEFAULT 50 SAMEMASK CENTERTOCENTER VA TO VA CUTCLASS VA VA 90 - ;";
        let r = table(parse_cut_spacing_table(&mut stmt(text), &ctx(&tech, 3)).unwrap());
        assert_eq!(r.spacing("VA", CutEdge::Side, "VA", CutEdge::Side), Some((90, 50)));
    }
}
