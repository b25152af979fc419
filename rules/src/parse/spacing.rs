//! Routing-layer spacing: plain `SPACING`, `SPACINGTABLE` and the LEF58 spacing table.

use super::{eol, finish};
use crate::constraint::*;
use crate::error::{Result, RuleError};
use crate::table::Lookup2D;
use crate::token::TokenStream;
use std::collections::BTreeMap;
use vroute_common::geom::Coord;

fn read_coords(ts: &mut TokenStream, what: &'static str) -> Result<Vec<Coord>> {
    let mut out = Vec::new();
    while ts.peek_is_number() {
        out.push(ts.expect_coord(what)?);
    }
    Ok(out)
}

fn single_value_table(spacing: Coord) -> SpacingPrlRule {
    SpacingPrlRule {
        table: Lookup2D::single("WIDTH", 0, "PARALLELRUNLENGTH", 0, spacing),
        wrong_direction: false,
        same_mask: false,
        except_eol: None,
        except_within: BTreeMap::new(),
    }
}

/// `SPACING` on a routing layer. Depending on its options this is a minimum spacing,
/// a same-net spacing or a classic end-of-line rule.
pub fn parse_routing_spacing(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("SPACING")?;
    let spacing = ts.expect_coord("spacing")?;
    match ts.peek() {
        None => Ok(Constraint::SpacingPrl(single_value_table(spacing))),
        Some("SAMENET") => {
            ts.next_token();
            let pg_only = ts.eat("PGONLY");
            finish(ts, "SPACING SAMENET")?;
            Ok(Constraint::SameNetSpacing(SameNetSpacingRule { spacing, pg_only }))
        }
        Some("ENDOFLINE") => eol::parse_classic_eol(ts, spacing),
        Some(_) => Err(ts.unsupported("SPACING")),
    }
}

/// Classic `SPACINGTABLE` with `PARALLELRUNLENGTH` or `TWOWIDTHS`.
pub fn parse_spacing_table(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("SPACINGTABLE")?;
    match ts.peek() {
        Some("PARALLELRUNLENGTH") => {
            ts.next_token();
            let prls = read_coords(ts, "parallel run length")?;
            let (widths, rows) = read_width_rows(ts)?;
            finish(ts, "SPACINGTABLE PARALLELRUNLENGTH")?;
            let table = Lookup2D::new("WIDTH", widths, "PARALLELRUNLENGTH", prls, rows)?;
            Ok(Constraint::SpacingPrl(SpacingPrlRule {
                table,
                ..single_value_table(0)
            }))
        }
        Some("TWOWIDTHS") => {
            ts.next_token();
            parse_two_widths(ts)
        }
        _ => Err(ts.unsupported("SPACINGTABLE")),
    }
}

fn read_width_rows(ts: &mut TokenStream) -> Result<(Vec<Coord>, Vec<Vec<Coord>>)> {
    let mut widths = Vec::new();
    let mut rows = Vec::new();
    while ts.eat("WIDTH") {
        widths.push(ts.expect_coord("width")?);
        rows.push(read_coords(ts, "spacing")?);
    }
    Ok((widths, rows))
}

fn parse_two_widths(ts: &mut TokenStream) -> Result<Constraint> {
    let mut widths = Vec::new();
    let mut prls = Vec::new();
    let mut values = Vec::new();
    while ts.eat("WIDTH") {
        widths.push(ts.expect_coord("width")?);
        prls.push(if ts.eat("PRL") {
            Some(ts.expect_coord("prl")?)
        } else {
            None
        });
        values.push(read_coords(ts, "spacing")?);
    }
    finish(ts, "SPACINGTABLE TWOWIDTHS")?;
    let n = widths.len();
    if n == 0 || values.iter().any(|r| r.len() != n) {
        return Err(RuleError::Invalid(format!(
            "TWOWIDTHS table needs {} values per row",
            n
        )));
    }
    if widths.windows(2).any(|w| w[0] > w[1]) {
        return Err(RuleError::Invalid("TWOWIDTHS widths are not ascending".into()));
    }
    Ok(Constraint::SpacingTwoWidths(TwoWidthsRule {
        widths,
        prls,
        values,
    }))
}

/// `LEF58_SPACINGTABLE`. Only the parallel run length form is supported.
pub fn parse_lef58_spacing_table(ts: &mut TokenStream) -> Result<Constraint> {
    ts.expect_keyword("SPACINGTABLE")?;
    if !ts.eat("PARALLELRUNLENGTH") {
        return Err(ts.unsupported("LEF58_SPACINGTABLE"));
    }
    let mut rule = single_value_table(0);
    loop {
        match ts.peek() {
            Some("WRONGDIRECTION") => rule.wrong_direction = true,
            Some("SAMEMASK") => rule.same_mask = true,
            Some("EXCEPTEOL") => {
                ts.next_token();
                rule.except_eol = Some(ts.expect_coord("except eol width")?);
                continue;
            }
            _ => break,
        }
        ts.next_token();
    }
    let prls = read_coords(ts, "parallel run length")?;

    let mut widths = Vec::new();
    let mut rows = Vec::new();
    while ts.eat("WIDTH") {
        widths.push(ts.expect_coord("width")?);
        rows.push(read_coords(ts, "spacing")?);
        if ts.eat("EXCEPTWITHIN") {
            let low = ts.expect_coord("except within low")?;
            let high = ts.expect_coord("except within high")?;
            rule.except_within.insert(widths.len() - 1, (low, high));
        }
    }
    finish(ts, "LEF58_SPACINGTABLE")?;
    rule.table = Lookup2D::new("WIDTH", widths, "PARALLELRUNLENGTH", prls, rows)?;
    Ok(Constraint::Lef58SpacingPrl(rule))
}
