use super::rect::Rect;
use rstar::{AABB, RTree, RTreeObject};

/// R-tree over rectangles tagged with a caller-defined id.
pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
}

struct IndexedRect {
    rect: Rect,
    id: usize,
}

impl RTreeObject for IndexedRect {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min.x, self.rect.min.y],
            [self.rect.max.x, self.rect.max.y],
        )
    }
}

impl SpatialIndex {
    /// Bulk-loads the index, which gives a better tree than repeated inserts.
    pub fn bulk_load(items: impl IntoIterator<Item = (Rect, usize)>) -> Self {
        let items = items
            .into_iter()
            .map(|(rect, id)| IndexedRect { rect, id })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Ids of every rect whose closed box intersects `rect`.
    pub fn query(&self, rect: Rect) -> Vec<usize> {
        let aabb = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        self.tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|item| item.id)
            .collect()
    }
}
