use serde::{Deserialize, Serialize};

/// Palette the avatar color index points into.
pub const AVATAR_PALETTE: [&str; 10] = [
    "purple", "blue", "pink", "green", "orange", "red", "yellow", "indigo", "teal", "cyan",
];

/// A user as seen from inside a pod or block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Up to two uppercase initials; `"U"` when the name has none.
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    if letters.is_empty() {
        "U".to_string()
    } else {
        letters
    }
}

/// Stable palette color for a user key (the 31-multiplier string hash).
pub fn avatar_color(user_key: &str) -> &'static str {
    let hash = user_key
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32));
    AVATAR_PALETTE[(hash.unsigned_abs() as usize) % AVATAR_PALETTE.len()]
}
