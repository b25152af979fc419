use super::finish;
use crate::constraint::CutClass;
use crate::error::Result;
use crate::token::TokenStream;

/// `CUTCLASS name WIDTH w [LENGTH l] [CUTS n]`. Length defaults to the width, cuts to 1.
pub fn parse_cut_class(ts: &mut TokenStream) -> Result<CutClass> {
    ts.expect_keyword("CUTCLASS")?;
    let name = ts.expect_word("cut class name")?;
    ts.expect_keyword("WIDTH")?;
    let via_width = ts.expect_coord("via width")?;
    let mut via_length = via_width;
    let mut num_cuts = 1;
    loop {
        match ts.peek() {
            Some("LENGTH") => {
                ts.next_token();
                via_length = ts.expect_coord("via length")?;
            }
            Some("CUTS") => {
                ts.next_token();
                num_cuts = ts.expect_count("cuts")?;
            }
            _ => break,
        }
    }
    finish(ts, "CUTCLASS")?;
    Ok(CutClass {
        name,
        via_width,
        via_length,
        num_cuts,
    })
}
