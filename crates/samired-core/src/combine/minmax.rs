/// Reject the single lowest and highest surviving value.
///
/// Stacks with fewer than three survivors are left untouched so that a mean
/// is always taken over at least one value.
pub fn minmax_clip(values: &[f32], mask: &mut [bool]) {
    let survivors = mask.iter().filter(|&&m| m).count();
    if survivors < 3 {
        return;
    }
    let mut lowest: Option<usize> = None;
    let mut highest: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if !mask[i] {
            continue;
        }
        if lowest.map_or(true, |l| v < values[l]) {
            lowest = Some(i);
        }
        if highest.map_or(true, |h| v >= values[h]) {
            highest = Some(i);
        }
    }
    if let (Some(l), Some(h)) = (lowest, highest) {
        mask[l] = false;
        mask[h] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_extremes() {
        let values = [3.0, 1.0, 2.0, 9.0];
        let mut mask = [true; 4];
        minmax_clip(&values, &mut mask);
        assert_eq!(mask, [true, false, true, false]);
    }

    #[test]
    fn equal_values_drop_two_distinct_entries() {
        let values = [5.0; 3];
        let mut mask = [true; 3];
        minmax_clip(&values, &mut mask);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 1);
    }

    #[test]
    fn short_stack_untouched() {
        let values = [1.0, 2.0];
        let mut mask = [true; 2];
        minmax_clip(&values, &mut mask);
        assert_eq!(mask, [true, true]);
    }
}
