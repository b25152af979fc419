use crate::constraint::*;
use crate::error::{Result, RuleError};
use crate::table::Lookup1D;
use crate::token::TokenStream;
use vroute_common::geom::Coord;

/// `CORNERSPACING {CONVEXCORNER ... | CONCAVECORNER ...} [EXCEPTSAMENET] [EXCEPTSAMEMETAL]
/// {WIDTH w SPACING s [s2]}...`
///
/// Every width row must carry the same number of spacings. One spacing applies to both
/// directions; two give separate x and y spacings.
pub fn parse_corner_spacing(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("CORNERSPACING")?;
    let corner = match ts.next_token() {
        Some("CONVEXCORNER") => CornerType::Convex(parse_convex(ts)?),
        Some("CONCAVECORNER") => CornerType::Concave(parse_concave(ts)?),
        Some(other) => {
            return Err(RuleError::Expected {
                expected: "CONVEXCORNER or CONCAVECORNER",
                found: other.to_string(),
            });
        }
        None => {
            return Err(RuleError::UnexpectedEnd {
                expected: "corner type",
            });
        }
    };
    let except_same_net = ts.eat("EXCEPTSAMENET");
    let except_same_metal = ts.eat("EXCEPTSAMEMETAL");

    let mut widths = Vec::new();
    let mut rows: Vec<Vec<Coord>> = Vec::new();
    while ts.eat("WIDTH") {
        widths.push(ts.expect_coord("corner width")?);
        ts.expect_keyword("SPACING")?;
        let mut row = vec![ts.expect_coord("corner spacing")?];
        if let Some(s) = ts.opt_coord("corner spacing")? {
            row.push(s);
        }
        rows.push(row);
    }
    if !ts.is_done() {
        return Err(ts.unsupported("CORNERSPACING"));
    }
    let entries = rows.first().map(Vec::len).ok_or(RuleError::UnexpectedEnd {
        expected: "WIDTH",
    })?;
    if rows.iter().any(|r| r.len() != entries) {
        return Err(RuleError::Invalid(
            "corner spacing rows have different entry counts".into(),
        ));
    }
    let same_xy = entries == 1;
    let values = rows
        .into_iter()
        .map(|r| if same_xy { (r[0], r[0]) } else { (r[0], r[1]) })
        .collect();
    Ok(Constraint::CornerSpacing(CornerSpacingRule {
        corner,
        except_same_net,
        except_same_metal,
        same_xy,
        table: Lookup1D::new("WIDTH", widths, values)?,
    }))
}

fn parse_convex(ts: &mut TokenStream) -> Result<ConvexCorner> {
    let mut c = ConvexCorner {
        same_mask: ts.eat("SAMEMASK"),
        ..ConvexCorner::default()
    };
    if ts.eat("CORNERONLY") {
        c.corner_only = Some(ts.expect_coord("corner only within")?);
    } else if ts.peek() == Some("CORNERTOCORNER") {
        return Err(ts.unsupported("CONVEXCORNER"));
    }
    if ts.eat("EXCEPTEOL") {
        c.except_eol = Some(ts.expect_coord("except eol width")?);
        if ts.eat("EXCEPTJOGLENGTH") {
            c.except_jog_length = Some(ts.expect_coord("jog length")?);
            c.edge_length = ts.eat("EDGELENGTH");
            c.include_lshape = ts.eat("INCLUDELSHAPE");
        }
    }
    Ok(c)
}

fn parse_concave(ts: &mut TokenStream) -> Result<ConcaveCorner> {
    let mut c = ConcaveCorner::default();
    if ts.eat("MINLENGTH") {
        c.min_length = Some(ts.expect_coord("concave min length")?);
    }
    if ts.eat("EXCEPTNOTCH") {
        c.except_notch = true;
        c.notch_length = ts.opt_coord("notch length")?;
    }
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::test_util::stmt;

    #[test]
    fn convex_with_xy_spacings() {
        let text = "CORNERSPACING CONVEXCORNER EXCEPTEOL 60 EXCEPTJOGLENGTH 20 INCLUDELSHAPE \
                    EXCEPTSAMENET WIDTH 0 SPACING 100 110 WIDTH 200 SPACING 150 160 ;";
        let Constraint::CornerSpacing(r) = parse_corner_spacing(&mut stmt(text)).unwrap() else {
            panic!("expected corner spacing")
        };
        assert_eq!(r.kind(), CornerKind::Convex);
        assert!(!r.same_xy && r.except_same_net);
        assert_eq!(r.spacing(250), (150, 160));
        assert_eq!(r.spacing(10), (100, 110));
        let CornerType::Convex(c) = r.corner else {
            unreachable!()
        };
        assert_eq!((c.except_eol, c.except_jog_length), (Some(60), Some(20)));
        assert!(c.include_lshape && !c.edge_length);
    }

    #[test]
    fn concave_with_single_spacing() {
        let text = "CORNERSPACING CONCAVECORNER MINLENGTH 50 EXCEPTNOTCH 30 WIDTH 0 SPACING 80 ;";
        let Constraint::CornerSpacing(r) = parse_corner_spacing(&mut stmt(text)).unwrap() else {
            panic!("expected corner spacing")
        };
        assert!(r.same_xy);
        assert_eq!(r.spacing(1000), (80, 80));
        assert_eq!(
            r.corner,
            CornerType::Concave(ConcaveCorner {
                min_length: Some(50),
                except_notch: true,
                notch_length: Some(30),
            })
        );
    }

    #[test]
    fn mixed_entry_counts_are_rejected() {
        let text = "CORNERSPACING CONVEXCORNER WIDTH 0 SPACING 100 WIDTH 200 SPACING 150 160 ;";
        assert!(matches!(
            parse_corner_spacing(&mut stmt(text)),
            Err(RuleError::Invalid(_))
        ));
    }

    #[test]
    fn missing_corner_type_is_rejected() {
        assert!(parse_corner_spacing(&mut stmt("CORNERSPACING WIDTH 0 SPACING 100 ;")).is_err());
    }
}
