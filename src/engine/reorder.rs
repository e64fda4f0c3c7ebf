// Sequence reordering algorithms
//
// Both functions are pure: they only rearrange, never add or drop items.

/// Move the item at `from` so it ends up at index `to`.
///
/// Every other item keeps its relative order. Out-of-range indices leave the
/// sequence untouched.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Move every item matching `is_moving` as one contiguous block.
///
/// `active_index` is the dragged item's position and `over_index` the drop
/// target's position, both in the original sequence. The target must not be
/// moving. The block lands just after the target when dragging forward
/// (`active_index < over_index`) and just before it otherwise.
///
/// Relative order inside the block and inside the remainder is preserved.
/// Hands the items back untouched as `Err` when `over_index` is out of range
/// or names a moving item.
pub fn block_move<T>(
    items: Vec<T>,
    is_moving: impl Fn(&T) -> bool,
    active_index: usize,
    over_index: usize,
) -> Result<Vec<T>, Vec<T>> {
    if over_index >= items.len() || is_moving(&items[over_index]) {
        return Err(items);
    }

    // The target's index among the staying items equals the number of staying
    // items in front of it.
    let target_in_staying = items[..over_index]
        .iter()
        .filter(|item| !is_moving(*item))
        .count();
    let insert_at = if active_index < over_index {
        target_in_staying + 1
    } else {
        target_in_staying
    };

    let (moving, mut staying): (Vec<T>, Vec<T>) =
        items.into_iter().partition(|item| is_moving(item));
    let tail = staying.split_off(insert_at);
    staying.extend(moving);
    staying.extend(tail);
    Ok(staying)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_move_forward_and_back() {
        let mut items = vec!['a', 'b', 'c', 'd'];
        array_move(&mut items, 0, 2);
        assert_eq!(items, vec!['b', 'c', 'a', 'd']);

        array_move(&mut items, 3, 0);
        assert_eq!(items, vec!['d', 'b', 'c', 'a']);
    }

    #[test]
    fn test_array_move_out_of_range_is_noop() {
        let mut items = vec![1, 2, 3];
        array_move(&mut items, 5, 0);
        array_move(&mut items, 0, 3);
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_block_move_forward_lands_after_target() {
        // moving {b, d}, drag b (index 1) onto e (index 4)
        let items = vec!['a', 'b', 'c', 'd', 'e', 'f'];
        let moved = block_move(items, |c| matches!(c, 'b' | 'd'), 1, 4).unwrap();
        assert_eq!(moved, vec!['a', 'c', 'e', 'b', 'd', 'f']);
    }

    #[test]
    fn test_block_move_backward_lands_before_target() {
        // moving {d, f}, drag f (index 5) onto b (index 1)
        let items = vec!['a', 'b', 'c', 'd', 'e', 'f'];
        let moved = block_move(items, |c| matches!(c, 'd' | 'f'), 5, 1).unwrap();
        assert_eq!(moved, vec!['a', 'd', 'f', 'b', 'c', 'e']);
    }

    #[test]
    fn test_block_move_onto_first_staying_item() {
        let items = vec!['a', 'b', 'c', 'd'];

        // backward onto the first staying element puts the block at the front
        let moved = block_move(items.clone(), |c| matches!(c, 'c' | 'd'), 3, 0).unwrap();
        assert_eq!(moved, vec!['c', 'd', 'a', 'b']);

        // forward onto the first staying element puts the block right after it
        let moved = block_move(items, |c| matches!(c, 'a'), 0, 1).unwrap();
        assert_eq!(moved, vec!['b', 'a', 'c', 'd']);
    }

    #[test]
    fn test_block_move_onto_last_staying_item() {
        let items = vec!['a', 'b', 'c', 'd'];

        // forward onto the last staying element appends the block
        let moved = block_move(items.clone(), |c| matches!(c, 'a' | 'b'), 1, 3).unwrap();
        assert_eq!(moved, vec!['c', 'd', 'a', 'b']);

        // backward onto the last staying element lands just before it
        let moved = block_move(items, |c| matches!(c, 'd'), 3, 2).unwrap();
        assert_eq!(moved, vec!['a', 'b', 'd', 'c']);
    }

    #[test]
    fn test_block_move_rejects_moving_target() {
        let items = vec![1, 2, 3];
        let rejected = block_move(items, |n| *n != 3, 0, 1).unwrap_err();
        assert_eq!(rejected, vec![1, 2, 3]);
    }

    #[test]
    fn test_block_move_rejects_out_of_range_target() {
        assert!(block_move(vec![1, 2], |_| false, 0, 2).is_err());
    }
}
