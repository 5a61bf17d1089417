use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Brown noise generator (integrated white noise), used as stand-in
/// microphone signal by the synthetic input.
pub struct BrownNoise {
    last_value: f32,
    rng: StdRng,
}

impl BrownNoise {
    pub fn new() -> Self {
        Self {
            last_value: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            last_value: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next `count` samples as little-endian 16-bit PCM.
    pub fn pcm16(&mut self, count: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(count * 2);
        for sample in self.by_ref().take(count) {
            let value = (sample * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

impl Default for BrownNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for BrownNoise {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let white: f32 = self.rng.gen_range(-1.0..1.0);

        // Small random steps, clamped so the walk cannot drift away
        self.last_value += white * 0.02;
        self.last_value = self.last_value.clamp(-1.0, 1.0);

        // Decay to keep DC offset from building up
        self.last_value *= 0.9999;

        Some(self.last_value * 0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let mut noise = BrownNoise::seeded(7);
        assert!(noise.by_ref().take(10_000).all(|s| (-0.3..=0.3).contains(&s)));
        assert_eq!(noise.pcm16(160).len(), 320);
    }
}
