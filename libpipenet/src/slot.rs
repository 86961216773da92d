use super::error::SlotError;

/// SlotLayout is the addressing scheme of a complete bounded-branching tree.
///
/// Every node of a complete tree with branching factor B and depths 0..=max_depth gets a
/// dense integer slot, assigned level by level. Each node owns a contiguous range of B
/// child slots one level down, reserved whether or not the children are realized. This
/// keeps slots unique for any subtree of the complete tree, and is what lets the
/// extractor use a pipe's slot directly as a tensor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    branching: usize,
    max_depth: usize,
    capacity: usize,
}

impl SlotLayout {
    /// Create a new layout. Fails if the branching factor is below 2 or if the capacity
    /// does not fit in a usize.
    pub fn new(branching: usize, max_depth: usize) -> Result<Self, SlotError> {
        if branching < 2 {
            return Err(SlotError::BadBranching(branching));
        }
        let capacity = geometric_sum(branching, max_depth + 1)?;
        Ok(Self {
            branching,
            max_depth,
            capacity,
        })
    }

    pub fn branching(&self) -> usize {
        self.branching
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Total number of slots, sum(B^i for i in 0..=max_depth)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, slot: usize) -> bool {
        slot < self.capacity
    }

    /// First slot at a given depth, (B^d - 1) / (B - 1). Depth max_depth + 1 is allowed
    /// and returns the capacity.
    pub fn first_slot_at_depth(&self, depth: usize) -> Result<usize, SlotError> {
        if depth > self.max_depth + 1 {
            return Err(SlotError::BelowMaxDepth(self.max_depth));
        }
        geometric_sum(self.branching, depth)
    }

    /// Slot of the `branch`-th child of the node at `parent_slot`, which sits at `parent_depth`
    pub fn child_slot(
        &self,
        parent_slot: usize,
        parent_depth: usize,
        branch: usize,
    ) -> Result<usize, SlotError> {
        if branch >= self.branching {
            return Err(SlotError::BadBranch {
                branch,
                branching: self.branching,
            });
        }
        if parent_depth >= self.max_depth {
            return Err(SlotError::BelowMaxDepth(parent_depth));
        }
        let level_start = self.first_slot_at_depth(parent_depth)?;
        let next_level_start = self.first_slot_at_depth(parent_depth + 1)?;
        if parent_slot < level_start || parent_slot >= next_level_start {
            return Err(SlotError::DepthMismatch {
                slot: parent_slot,
                depth: parent_depth,
            });
        }
        let slot = next_level_start + self.branching * (parent_slot - level_start) + branch;
        if slot >= self.capacity {
            return Err(SlotError::Overflow {
                slot,
                capacity: self.capacity,
            });
        }
        Ok(slot)
    }

    /// Slot of the `index`-th node (0-indexed, left to right) at `depth`
    pub fn slot_at(&self, depth: usize, index: usize) -> Result<usize, SlotError> {
        let slot = self.first_slot_at_depth(depth)? + index;
        if depth > self.max_depth || slot >= self.first_slot_at_depth(depth + 1)? {
            return Err(SlotError::Overflow {
                slot,
                capacity: self.capacity,
            });
        }
        Ok(slot)
    }

    /// Decode the depth of a slot. Returns None for slots outside the layout.
    pub fn depth_of_slot(&self, slot: usize) -> Option<usize> {
        if !self.contains(slot) {
            return None;
        }
        let mut level_end = 1;
        let mut level_size = 1;
        for depth in 0..=self.max_depth {
            if slot < level_end {
                return Some(depth);
            }
            level_size *= self.branching;
            level_end += level_size;
        }
        None
    }
}

/// sum(b^i for i in 0..n), with overflow checks
fn geometric_sum(branching: usize, n: usize) -> Result<usize, SlotError> {
    let mut total: usize = 0;
    let mut term: usize = 1;
    for depth in 0..n {
        total = total
            .checked_add(term)
            .ok_or(SlotError::ArithmeticOverflow(depth))?;
        if depth + 1 < n {
            term = term
                .checked_mul(branching)
                .ok_or(SlotError::ArithmeticOverflow(depth))?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let layout = SlotLayout::new(4, 5).unwrap();
        assert_eq!(layout.capacity(), 1365);
        let single = SlotLayout::new(4, 0).unwrap();
        assert_eq!(single.capacity(), 1);
        let binary = SlotLayout::new(2, 3).unwrap();
        assert_eq!(binary.capacity(), 15);
    }

    #[test]
    fn test_bad_branching() {
        assert_eq!(SlotLayout::new(1, 5), Err(SlotError::BadBranching(1)));
        assert_eq!(SlotLayout::new(0, 5), Err(SlotError::BadBranching(0)));
    }

    #[test]
    fn test_first_slot_at_depth() {
        let layout = SlotLayout::new(4, 5).unwrap();
        let firsts: Vec<usize> = (0..=6)
            .map(|d| layout.first_slot_at_depth(d).unwrap())
            .collect();
        assert_eq!(firsts, vec![0, 1, 5, 21, 85, 341, 1365]);
    }

    #[test]
    fn test_child_slots() {
        let layout = SlotLayout::new(4, 5).unwrap();
        assert_eq!(layout.child_slot(0, 0, 0).unwrap(), 1);
        assert_eq!(layout.child_slot(0, 0, 3).unwrap(), 4);
        assert_eq!(layout.child_slot(1, 1, 0).unwrap(), 5);
        assert_eq!(layout.child_slot(2, 1, 1).unwrap(), 10);
        assert_eq!(layout.child_slot(4, 1, 3).unwrap(), 20);
        assert_eq!(layout.child_slot(340, 4, 3).unwrap(), 1364);
    }

    #[test]
    fn test_child_slot_errors() {
        let layout = SlotLayout::new(4, 2).unwrap();
        assert_eq!(
            layout.child_slot(0, 0, 4),
            Err(SlotError::BadBranch {
                branch: 4,
                branching: 4
            })
        );
        assert_eq!(layout.child_slot(5, 2, 0), Err(SlotError::BelowMaxDepth(2)));
        assert_eq!(
            layout.child_slot(5, 1, 0),
            Err(SlotError::DepthMismatch { slot: 5, depth: 1 })
        );
    }

    #[test]
    fn test_children_never_collide() {
        let layout = SlotLayout::new(3, 4).unwrap();
        let mut seen = vec![false; layout.capacity()];
        seen[0] = true;
        for depth in 0..layout.max_depth() {
            let start = layout.first_slot_at_depth(depth).unwrap();
            let end = layout.first_slot_at_depth(depth + 1).unwrap();
            for parent in start..end {
                for branch in 0..layout.branching() {
                    let child = layout.child_slot(parent, depth, branch).unwrap();
                    assert!(!seen[child], "slot {child} allocated twice");
                    seen[child] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_depth_round_trip() {
        for branching in 2..=5 {
            let layout = SlotLayout::new(branching, 4).unwrap();
            for depth in 0..=4 {
                let width = branching.pow(depth as u32);
                for index in 0..width {
                    let slot = layout.slot_at(depth, index).unwrap();
                    assert_eq!(layout.depth_of_slot(slot), Some(depth));
                }
                assert!(layout.slot_at(depth, width).is_err());
            }
        }
    }

    #[test]
    fn test_depth_out_of_range() {
        let layout = SlotLayout::new(4, 5).unwrap();
        assert_eq!(layout.depth_of_slot(1364), Some(5));
        assert_eq!(layout.depth_of_slot(1365), None);
    }
}
