//! Route guide files.
//!
//! ```text
//! net_a
//! (
//! 0 0 3000 3000 M1
//! 0 0 3000 9000 M2
//! )
//! ```
//! A one-token line opens a net; a five-token line is `minX minY maxX maxY layerName`.

use crate::db::core::{DesignDB, LayerRange};
use crate::db::error::GuideError;
use crate::db::indices::{LayerId, NetId};
use crate::geom::Coord;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guide {
    pub layer: LayerId,
    pub rect: Rect,
}

pub type GuideMap = BTreeMap<NetId, Vec<Guide>>;

/// Parses a whole guide stream. Any bad line rejects the stream; nothing is returned for it.
pub fn read_guides<R: BufRead>(
    reader: R,
    db: &DesignDB,
    range: LayerRange,
) -> Result<GuideMap, GuideError> {
    let mut guides = GuideMap::new();
    let mut current: Option<NetId> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[..] {
            [] | ["("] | [")"] => {}
            [name] => {
                let net = db.net_by_name(name).ok_or_else(|| GuideError::UnknownNet {
                    line: line_no,
                    name: name.to_string(),
                })?;
                guides.entry(net).or_default();
                current = Some(net);
            }
            [x1, y1, x2, y2, layer_name] => {
                let net = current.ok_or(GuideError::NoCurrentNet { line: line_no })?;
                let coord = |t: &str| {
                    t.parse::<Coord>().map_err(|_| GuideError::BadCoordinate {
                        line: line_no,
                        token: t.to_string(),
                    })
                };
                let rect = Rect::from_corners(
                    Point::new(coord(x1)?, coord(y1)?),
                    Point::new(coord(x2)?, coord(y2)?),
                );
                let layer =
                    db.tech
                        .layer_by_name(layer_name)
                        .ok_or_else(|| GuideError::UnknownLayer {
                            line: line_no,
                            name: layer_name.to_string(),
                        })?;
                let in_range = db
                    .tech
                    .layer(layer)
                    .routing_index
                    .is_some_and(|z| range.contains(z));
                if !in_range {
                    return Err(GuideError::LayerOutOfRange {
                        line: line_no,
                        name: layer_name.to_string(),
                    });
                }
                guides.entry(net).or_default().push(Guide { layer, rect });
            }
            _ => {
                return Err(GuideError::BadTokenCount {
                    line: line_no,
                    count: tokens.len(),
                });
            }
        }
    }
    Ok(guides)
}

/// Reads `path` and merges it into `guides` only if the whole file is valid.
pub fn import_guides(
    path: &Path,
    db: &DesignDB,
    range: LayerRange,
    guides: &mut GuideMap,
) -> Result<usize, GuideError> {
    let file = File::open(path)?;
    let staged = read_guides(BufReader::new(file), db, range)?;
    let count = staged.len();
    for (net, mut list) in staged {
        guides.entry(net).or_default().append(&mut list);
    }
    log::info!("Imported guides for {} nets from {:?}", count, path);
    Ok(count)
}

pub fn write_guides<W: Write>(mut w: W, db: &DesignDB, guides: &GuideMap) -> std::io::Result<()> {
    for (net, list) in guides {
        if list.is_empty() {
            continue;
        }
        writeln!(w, "{}", db.nets[net.index()].name)?;
        writeln!(w, "(")?;
        for g in list {
            writeln!(
                w,
                "{} {} {} {} {}",
                g.rect.min.x,
                g.rect.min.y,
                g.rect.max.x,
                g.rect.max.y,
                db.tech.layer(g.layer).name
            )?;
        }
        writeln!(w, ")")?;
    }
    Ok(())
}
