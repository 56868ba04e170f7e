//! Random password generation

use rand::seq::SliceRandom;
use rand::Rng;

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+?";

/// Selected character classes for [`generate`].
#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            upper: true,
            lower: true,
            digits: true,
            symbols: true,
        }
    }
}

/// Generate a random password of `length` characters drawn from the
/// selected classes, with at least one character from each. Look-alike
/// characters (O/0, l/1) are excluded from the alphabets.
///
/// Returns `None` when no class is selected or `length` cannot fit one
/// character per selected class.
pub fn generate(length: usize, options: GeneratorOptions) -> Option<String> {
    let mut classes: Vec<&[u8]> = Vec::new();
    if options.upper {
        classes.push(UPPER);
    }
    if options.lower {
        classes.push(LOWER);
    }
    if options.digits {
        classes.push(DIGITS);
    }
    if options.symbols {
        classes.push(SYMBOLS);
    }

    if classes.is_empty() || length < classes.len() {
        return None;
    }

    let pool: Vec<u8> = classes.concat();
    let mut rng = rand::thread_rng();

    // One guaranteed pick per class, the rest from the combined pool.
    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    Some(chars.into_iter().map(char::from).collect())
}
