pub trait ComponentSource {
    fn component_count(&self) -> usize;

    /// Writes the components starting at `offset`. Writes stop at the end of
    /// `buffer`.
    fn write_into(&self, buffer: &mut [f32], offset: usize);
}

impl ComponentSource for f32 {
    fn component_count(&self) -> usize {
        1
    }

    fn write_into(&self, buffer: &mut [f32], offset: usize) {
        if let Some(slot) = buffer.get_mut(offset) {
            *slot = *self;
        }
    }
}

impl<const N: usize> ComponentSource for [f32; N] {
    fn component_count(&self) -> usize {
        N
    }

    fn write_into(&self, buffer: &mut [f32], offset: usize) {
        self.as_slice().write_into(buffer, offset);
    }
}

impl ComponentSource for Vec<f32> {
    fn component_count(&self) -> usize {
        self.len()
    }

    fn write_into(&self, buffer: &mut [f32], offset: usize) {
        self.as_slice().write_into(buffer, offset);
    }
}

impl ComponentSource for [f32] {
    fn component_count(&self) -> usize {
        self.len()
    }

    fn write_into(&self, buffer: &mut [f32], offset: usize) {
        if offset >= buffer.len() {
            return;
        }
        let len = self.len().min(buffer.len() - offset);
        buffer[offset..offset + len].copy_from_slice(&self[..len]);
    }
}

/// Writes entry `i` at `i * stride`, each clipped to its own slot.
///
/// Entries past the end of `out` are dropped; slots without an entry keep
/// their previous contents. Returns the number of entries written.
pub fn flatten(entries: &[&dyn ComponentSource], stride: usize, out: &mut [f32]) -> usize {
    let stride = stride.max(1);
    let mut written = 0;
    for (index, entry) in entries.iter().enumerate() {
        let start = index * stride;
        if start >= out.len() {
            break;
        }
        let end = (start + stride).min(out.len());
        entry.write_into(&mut out[..end], start);
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_entry_and_component_count() {
        for n in [1usize, 2, 3, 4, 9, 16] {
            for k in [1usize, 2, 3, 4, 9, 16] {
                let entries: Vec<Vec<f32>> = (0..n)
                    .map(|i| (0..k).map(|j| (i * k + j) as f32).collect())
                    .collect();
                let refs: Vec<&dyn ComponentSource> =
                    entries.iter().map(|e| e as &dyn ComponentSource).collect();
                let mut out = vec![-1.0; n * k];
                assert_eq!(flatten(&refs, k, &mut out), n);
                let expected: Vec<f32> = entries.iter().flatten().copied().collect();
                assert_eq!(out, expected, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn oversized_entries_stay_in_their_slot() {
        let entries: [&dyn ComponentSource; 2] = [&[1.0f32, 2.0, 3.0], &[4.0f32, 5.0]];
        let mut out = [0.0; 4];
        flatten(&entries, 2, &mut out);
        assert_eq!(out, [1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn missing_entries_keep_previous_values() {
        let entries: [&dyn ComponentSource; 1] = [&[7.0f32, 8.0]];
        let mut out = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(flatten(&entries, 2, &mut out), 1);
        assert_eq!(out, [7.0, 8.0, 1.0, 1.0]);
    }
}
