// (first row, row step) of the four interlace passes
const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Destination rows in the order an interlaced image stores them.
pub fn interlaced_row_order(height: usize) -> impl Iterator<Item = usize> {
    PASSES
        .iter()
        .flat_map(move |&(start, step)| (start..height).step_by(step))
}

/// Moves rows stored in interlace pass order back to top-to-bottom order.
pub fn deinterlace(pixels: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return pixels.to_vec();
    }

    let height = pixels.len() / width;
    let mut result = vec![0; pixels.len()];

    for (from_row, to_row) in interlaced_row_order(height).enumerate() {
        let from = from_row * width;
        let to = to_row * width;
        result[to..to + width].copy_from_slice(&pixels[from..from + width]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_rows_visit_passes_in_order() {
        let order: Vec<usize> = interlaced_row_order(8).collect();
        assert_eq!(order, vec![0, 4, 2, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn reconstructs_row_order() {
        // each stored row is filled with the number of the row it belongs to
        let width = 3;
        let stored: Vec<u8> = [0u8, 4, 2, 6, 1, 3, 5, 7]
            .iter()
            .flat_map(|&row| std::iter::repeat(row).take(width))
            .collect();

        let rows = deinterlace(&stored, width);

        let expected: Vec<u8> = (0..8u8)
            .flat_map(|row| std::iter::repeat(row).take(width))
            .collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn short_images_skip_empty_passes() {
        assert_eq!(interlaced_row_order(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(interlaced_row_order(3).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(deinterlace(&[1, 2, 3], 1), vec![1, 3, 2]);
    }
}
