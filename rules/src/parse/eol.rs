//! End-of-line spacing rules.

use super::finish;
use crate::constraint::*;
use crate::error::Result;
use crate::token::TokenStream;
use vroute_common::geom::Coord;

/// `SPACING s ENDOFLINE w WITHIN d [PARALLELEDGE ps WITHIN pd [TWOEDGES]]`, with the
/// spacing already read.
pub fn parse_classic_eol(ts: &mut TokenStream, eol_space: Coord) -> Result<Constraint> {
    ts.expect_keyword("ENDOFLINE")?;
    let eol_width = ts.expect_coord("eol width")?;
    ts.expect_keyword("WITHIN")?;
    let eol_within = ts.expect_coord("eol within")?;
    let parallel_edge = if ts.eat("PARALLELEDGE") {
        let par_space = ts.expect_coord("parallel edge space")?;
        ts.expect_keyword("WITHIN")?;
        let par_within = ts.expect_coord("parallel edge within")?;
        Some(ParallelEdge {
            par_space,
            par_within,
            two_edges: ts.eat("TWOEDGES"),
        })
    } else {
        None
    };
    finish(ts, "SPACING ENDOFLINE")?;
    Ok(Constraint::EolSpacing(EolSpacingRule {
        eol_space,
        eol_width,
        eol_within,
        parallel_edge,
    }))
}

/// `LEF58_SPACING` on a routing layer. Only the end-of-line WITHIN form is compiled.
pub fn parse_lef58_spacing(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("SPACING")?;
    let eol_space = ts.expect_coord("eol spacing")?;
    if ts.peek() != Some("ENDOFLINE") {
        return Err(ts.unsupported("LEF58_SPACING"));
    }
    ts.next_token();
    let mut rule = Lef58EolRule {
        eol_space,
        eol_width: ts.expect_coord("eol width")?,
        ..Lef58EolRule::default()
    };

    loop {
        match ts.peek() {
            Some("EXACTWIDTH") => {
                ts.next_token();
                rule.exact_width = true;
            }
            Some("WRONGDIRSPACING") => {
                ts.next_token();
                rule.wrong_dir_space = Some(ts.expect_coord("wrong direction spacing")?);
            }
            Some("OPPOSITEWIDTH") => {
                ts.next_token();
                rule.opposite_width = Some(ts.expect_coord("opposite width")?);
            }
            _ => break,
        }
    }
    match ts.peek() {
        Some("WITHIN") => {
            ts.next_token();
            rule.eol_within = ts.expect_coord("eol within")?;
            rule.wrong_dir_within = ts.opt_coord("wrong direction within")?;
        }
        // TOCONCAVECORNER, TONOTCHLENGTH and friends.
        _ => return Err(ts.unsupported("LEF58_SPACING ENDOFLINE")),
    }

    while let Some(kw) = ts.peek() {
        match kw {
            "SAMEMASK" => {
                ts.next_token();
                rule.same_mask = true;
            }
            "ENDTOEND" => {
                ts.next_token();
                rule.end_to_end = Some(parse_end_to_end(ts)?);
            }
            "MAXLENGTH" | "MINLENGTH" => {
                let is_max = kw == "MAXLENGTH";
                ts.next_token();
                let length = ts.expect_coord("eol length")?;
                rule.length = Some(EolLength {
                    is_max,
                    length,
                    two_sides: ts.eat("TWOSIDES"),
                });
            }
            "PARALLELEDGE" => {
                ts.next_token();
                rule.parallel_edge = Some(parse_lef58_parallel_edge(ts)?);
            }
            _ => return Err(ts.unsupported("LEF58_SPACING ENDOFLINE")),
        }
    }
    Ok(Constraint::Lef58Eol(rule))
}

fn parse_end_to_end(ts: &mut TokenStream) -> Result<EndToEnd> {
    let mut e2e = EndToEnd {
        space: ts.expect_coord("end to end spacing")?,
        ..EndToEnd::default()
    };
    if ts.peek_is_number() {
        e2e.one_cut_space = Some(ts.expect_coord("one cut spacing")?);
        e2e.two_cut_space = Some(ts.expect_coord("two cut spacing")?);
    }
    if ts.eat("EXTENSION") {
        e2e.extension = Some(ts.expect_coord("extension")?);
        e2e.wrong_dir_extension = ts.opt_coord("wrong direction extension")?;
    }
    if ts.eat("OTHERENDWIDTH") {
        e2e.other_end_width = Some(ts.expect_coord("other end width")?);
    }
    Ok(e2e)
}

fn parse_lef58_parallel_edge(ts: &mut TokenStream) -> Result<Lef58ParallelEdge> {
    let mut pe = Lef58ParallelEdge {
        subtract_eol_width: ts.eat("SUBTRACTEOLWIDTH"),
        ..Lef58ParallelEdge::default()
    };
    pe.par_space = ts.expect_coord("parallel edge space")?;
    ts.expect_keyword("WITHIN")?;
    pe.par_within = ts.expect_coord("parallel edge within")?;
    loop {
        match ts.peek() {
            Some("PRL") => {
                ts.next_token();
                pe.prl = Some(ts.expect_coord("parallel edge prl")?);
            }
            Some("MINLENGTH") => {
                ts.next_token();
                pe.min_length = Some(ts.expect_coord("parallel edge min length")?);
            }
            Some("TWOEDGES") => {
                ts.next_token();
                pe.two_edges = true;
            }
            Some("SAMEMETAL") => {
                ts.next_token();
                pe.same_metal = true;
            }
            Some("NONEOLCORNERONLY") => {
                ts.next_token();
                pe.non_eol_corner_only = true;
            }
            Some("PARALLELSAMEMASK") => {
                ts.next_token();
                pe.parallel_same_mask = true;
            }
            _ => return Ok(pe),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_util::stmt;
    use rstest::rstest;

    #[test]
    fn classic_eol_with_parallel_edge() {
        let mut ts = stmt("SPACING 90 ENDOFLINE 70 WITHIN 25 PARALLELEDGE 100 WITHIN 60 TWOEDGES ;");
        ts.expect_keyword("SPACING").unwrap();
        let s = ts.expect_coord("s").unwrap();
        let c = parse_classic_eol(&mut ts, s).unwrap();
        assert_eq!(
            c,
            Constraint::EolSpacing(EolSpacingRule {
                eol_space: 90,
                eol_width: 70,
                eol_within: 25,
                parallel_edge: Some(ParallelEdge {
                    par_space: 100,
                    par_within: 60,
                    two_edges: true
                }),
            })
        );
    }

    #[test]
    fn lef58_eol_full_form() {
        let text = "SPACING 80 ENDOFLINE 60 EXACTWIDTH WRONGDIRSPACING 70 WITHIN 25 30 SAMEMASK \
                    ENDTOEND 90 100 110 EXTENSION 10 12 OTHERENDWIDTH 40 \
                    MINLENGTH 200 TWOSIDES \
                    PARALLELEDGE SUBTRACTEOLWIDTH 120 WITHIN 50 PRL 20 MINLENGTH 30 TWOEDGES ;";
        let Constraint::Lef58Eol(r) = parse_lef58_spacing(&mut stmt(text)).unwrap() else {
            panic!("expected LEF58 eol");
        };
        assert!(r.exact_width && r.same_mask);
        assert_eq!(r.wrong_dir_space, Some(70));
        assert_eq!((r.eol_within, r.wrong_dir_within), (25, Some(30)));
        let e2e = r.end_to_end.unwrap();
        assert_eq!((e2e.one_cut_space, e2e.two_cut_space), (Some(100), Some(110)));
        assert_eq!(e2e.wrong_dir_extension, Some(12));
        assert_eq!(e2e.other_end_width, Some(40));
        let len = r.length.unwrap();
        assert!(!len.is_max && len.two_sides);
        let pe = r.parallel_edge.unwrap();
        assert!(pe.subtract_eol_width && pe.two_edges);
        assert_eq!((pe.par_space, pe.par_within, pe.prl, pe.min_length), (120, 50, Some(20), Some(30)));
    }

    #[rstest]
    #[case("SPACING 80 ;")]
    #[case("SPACING 80 ENDOFLINE 60 TOCONCAVECORNER ;")]
    #[case("SPACING 80 ENDOFLINE 60 WITHIN 25 ENCLOSECUT BELOW 10 CUTSPACING 20 ;")]
    #[case("SPACING 80 ENDOFLINE 60 WITHIN 25 EQUALRECTWIDTH ;")]
    fn unsupported_lef58_spacing(#[case] text: &str) {
        assert!(parse_lef58_spacing(&mut stmt(text)).unwrap_err().is_unsupported());
    }
}
