//! Single-value rules.

use super::finish;
use crate::constraint::*;
use crate::error::Result;
use crate::token::TokenStream;

pub fn parse_min_width(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("MINWIDTH")?;
    let min_width = ts.expect_coord("min width")?;
    finish(ts, "MINWIDTH")?;
    Ok(Constraint::MinWidth(MinWidthRule { min_width }))
}

pub fn parse_area(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("AREA")?;
    let area = ts.expect_area("area")?;
    finish(ts, "AREA")?;
    Ok(Constraint::MinArea(MinAreaRule { area }))
}

pub fn parse_min_enclosed_area(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("MINENCLOSEDAREA")?;
    let area = ts.expect_area("enclosed area")?;
    let width = if ts.eat("WIDTH") {
        Some(ts.expect_coord("enclosed area width")?)
    } else {
        None
    };
    finish(ts, "MINENCLOSEDAREA")?;
    Ok(Constraint::MinEnclosedArea(MinEnclosedAreaRule { area, width }))
}

pub fn parse_rect_only(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("RECTONLY")?;
    let except_non_core_pins = ts.eat("EXCEPTNONCOREPINS");
    finish(ts, "RECTONLY")?;
    Ok(Constraint::RectOnly(RectOnlyRule {
        except_non_core_pins,
    }))
}

pub fn parse_right_way_on_grid_only(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("RIGHTWAYONGRIDONLY")?;
    let check_mask = ts.eat("CHECKMASK");
    finish(ts, "RIGHTWAYONGRIDONLY")?;
    Ok(Constraint::RightWayOnGridOnly(RightWayOnGridOnlyRule {
        check_mask,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::parse::test_util::stmt;

    #[test]
    fn area_is_scaled_twice() {
        let mut ts = TokenStream::new("AREA 0.02 ;", 1000.0).statements().remove(0);
        assert_eq!(
            parse_area(&mut ts).unwrap(),
            Constraint::MinArea(MinAreaRule { area: 20_000 })
        );
    }

    #[test]
    fn enclosed_area_with_width() {
        let c = parse_min_enclosed_area(&mut stmt("MINENCLOSEDAREA 400 WIDTH 30 ;")).unwrap();
        assert_eq!(
            c,
            Constraint::MinEnclosedArea(MinEnclosedAreaRule {
                area: 400,
                width: Some(30)
            })
        );
    }

    #[test]
    fn trailing_garbage_drops_rule() {
        let err = parse_rect_only(&mut stmt("RECTONLY EXCEPTNONCOREPINS FOO ;")).unwrap_err();
        assert!(err.is_unsupported());
        assert!(matches!(
            parse_min_width(&mut stmt("MINWIDTH ;")),
            Err(RuleError::UnexpectedEnd { .. })
        ));
    }
}
