use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Advances `state` and returns a generator seeded from its previous value.
///
/// All randomness in a match flows through one `u64` stored in the game state,
/// so replaying the same actions from the same seed reproduces the same match.
fn step(state: &mut u64) -> SmallRng {
    let mut rng = SmallRng::seed_from_u64(*state);
    *state = rng.gen();
    rng
}

pub fn shuffle_seeded<T>(items: &mut [T], state: &mut u64) {
    let mut rng = step(state);
    items.shuffle(&mut rng);
}

pub fn pick_index(len: usize, state: &mut u64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let mut rng = step(state);
    Some(rng.gen_range(0..len))
}

/// Derives an independent seed, leaving `state` advanced.
pub fn split_seed(state: &mut u64) -> u64 {
    step(state).gen()
}
