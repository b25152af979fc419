use super::finish;
use crate::constraint::*;
use crate::error::Result;
use crate::token::TokenStream;

/// `MINSTEP l [INSIDECORNER | OUTSIDECORNER | STEP] [LENGTHSUM max | MAXEDGES n]`
///
/// A rule with `MAXEDGES` applies to every step type. Without a type or edge count the
/// rule is an outside-corner rule.
pub fn parse_min_step(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("MINSTEP")?;
    let mut rule = MinStepRule {
        min_step_length: ts.expect_coord("min step length")?,
        ..MinStepRule::default()
    };
    let step_type = match ts.peek() {
        Some("INSIDECORNER") => Some(MinStepType::InsideCorner),
        Some("OUTSIDECORNER") => Some(MinStepType::OutsideCorner),
        Some("STEP") => Some(MinStepType::Step),
        _ => None,
    };
    if step_type.is_some() {
        ts.next_token();
    }
    if ts.eat("LENGTHSUM") {
        rule.max_length = Some(ts.expect_coord("length sum")?);
    }
    if ts.eat("MAXEDGES") {
        rule.max_edges = Some(ts.expect_count("max edges")?);
    }
    finish(ts, "MINSTEP")?;
    rule.step_type = match (step_type, rule.max_edges) {
        (_, Some(_)) => None,
        (Some(t), None) => Some(t),
        (None, None) => Some(MinStepType::OutsideCorner),
    };
    Ok(Constraint::MinStep(rule))
}

/// `LEF58_MINSTEP`: `MINSTEP l [MAXEDGES n] [MINADJACENTLENGTH l] [NOBETWEENEOL w]`.
pub fn parse_lef58_min_step(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("MINSTEP")?;
    let mut rule = MinStepRule {
        min_step_length: ts.expect_coord("min step length")?,
        ..MinStepRule::default()
    };
    loop {
        match ts.peek() {
            Some("MAXEDGES") => {
                ts.next_token();
                rule.max_edges = Some(ts.expect_count("max edges")?);
            }
            Some("MINADJACENTLENGTH") => {
                ts.next_token();
                rule.min_adjacent_length = Some(ts.expect_coord("min adjacent length")?);
            }
            Some("NOBETWEENEOL") => {
                ts.next_token();
                rule.no_between_eol = Some(ts.expect_coord("eol width")?);
            }
            None => break,
            Some(_) => return Err(ts.unsupported("LEF58_MINSTEP")),
        }
    }
    Ok(Constraint::Lef58MinStep(rule))
}
