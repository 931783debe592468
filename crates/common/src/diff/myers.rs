// Myers O(ND) shortest edit script over arbitrary comparable items.
//
// The common prefix and suffix are trimmed before the search, so a typical
// keystroke-sized edit in a large document only diffs the changed middle.
// Past `MAX_EDIT_DISTANCE` the search gives up and reports the middle as a
// single delete-then-insert, which is still a valid (if coarse) script.

/// Edit distance beyond which the middle section is replaced wholesale.
pub const MAX_EDIT_DISTANCE: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit<T> {
    Equal(T),
    Insert(T),
    Delete(T),
}

/// Computes an edit script transforming `old` into `new`.
pub fn diff<T: PartialEq + Copy>(old: &[T], new: &[T]) -> Vec<Edit<T>> {
    let prefix = old.iter().zip(new.iter()).take_while(|(a, b)| a == b).count();
    let old_rest = &old[prefix..];
    let new_rest = &new[prefix..];
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let mut edits: Vec<Edit<T>> = old[..prefix].iter().copied().map(Edit::Equal).collect();
    edits.extend(middle_edits(old_mid, new_mid));
    edits.extend(old_rest[old_rest.len() - suffix..].iter().copied().map(Edit::Equal));
    edits
}

fn middle_edits<T: PartialEq + Copy>(old: &[T], new: &[T]) -> Vec<Edit<T>> {
    if old.is_empty() {
        return new.iter().copied().map(Edit::Insert).collect();
    }
    if new.is_empty() {
        return old.iter().copied().map(Edit::Delete).collect();
    }

    let old_len = old.len();
    let new_len = new.len();
    let max = old_len + new_len;
    let offset = max as isize;
    let mut v = vec![0isize; 2 * max + 1];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    for d in 0..=max {
        if d > MAX_EDIT_DISTANCE {
            return replace_all(old, new);
        }
        // Only diagonals -d..=d are reachable at this depth.
        trace.push(v[(offset - d as isize) as usize..=(offset + d as isize) as usize].to_vec());

        let d_isize = d as isize;
        let mut k = -d_isize;
        while k <= d_isize {
            let mut x = if k == -d_isize
                || (k != d_isize && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize])
            {
                v[(k + 1 + offset) as usize]
            } else {
                v[(k - 1 + offset) as usize] + 1
            };
            let mut y = x - k;

            while x < old_len as isize && y < new_len as isize && old[x as usize] == new[y as usize]
            {
                x += 1;
                y += 1;
            }

            v[(k + offset) as usize] = x;

            if x >= old_len as isize && y >= new_len as isize {
                return backtrack(old, new, &trace, d);
            }

            k += 2;
        }
    }

    replace_all(old, new)
}

fn replace_all<T: Copy>(old: &[T], new: &[T]) -> Vec<Edit<T>> {
    old.iter()
        .copied()
        .map(Edit::Delete)
        .chain(new.iter().copied().map(Edit::Insert))
        .collect()
}

fn backtrack<T: Copy>(
    old: &[T],
    new: &[T],
    trace: &[Vec<isize>],
    solved_d: usize,
) -> Vec<Edit<T>> {
    let mut edits = Vec::new();
    let mut x = old.len() as isize;
    let mut y = new.len() as isize;

    for d in (0..=solved_d).rev() {
        let band = &trace[d];
        let k = x - y;
        let d_isize = d as isize;
        let at = |diagonal: isize| band[(diagonal + d_isize) as usize];

        let prev_k = if d == 0 {
            0
        } else if k == -d_isize || (k != d_isize && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = if d == 0 { 0 } else { at(prev_k) };
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Equal(old[(x - 1) as usize]));
            x -= 1;
            y -= 1;
        }

        if d == 0 {
            break;
        }

        if x == prev_x {
            edits.push(Edit::Insert(new[(y - 1) as usize]));
            y -= 1;
        } else {
            edits.push(Edit::Delete(old[(x - 1) as usize]));
            x -= 1;
        }
    }

    edits.reverse();
    edits
}
