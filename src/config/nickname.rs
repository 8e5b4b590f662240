//! Default nickname generator.
//!
//! Produces nicknames like `sifr-fox42` so that several unconfigured
//! instances do not collide on the same network.

use rand::RngExt;

const ANIMALS: &[&str] = &[
    "fox", "owl", "elk", "yak", "emu", "cat", "bat", "ant", "eel", "jay", "ram", "gnu",
];

pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("sifr-{}{}", animal, num)
}
