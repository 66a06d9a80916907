use crate::services::platform::UserId;
use rand::Rng;

/// Draws `count` distinct winners uniformly at random (partial Fisher-Yates).
/// Asking for more winners than entries returns every entry, shuffled.
pub fn pick_winners<R: Rng + ?Sized>(entries: &[UserId], count: usize, rng: &mut R) -> Vec<UserId> {
    let mut pool = entries.to_vec();
    let take = count.min(pool.len());

    for i in 0..take {
        let j = rng.gen_range(i..pool.len());
        pool.swap(i, j);
    }

    pool.truncate(take);
    pool
}
