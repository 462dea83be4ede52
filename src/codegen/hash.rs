//! Stable numeric IDs for tag and value names.

/// Hash an identifier into the 32-bit ID emitted as its constant.
///
/// Starts at 17 and folds `h * 31 + unit` over the UTF-16 code units of
/// `name` with wrapping arithmetic. Generated constants may end up in
/// serialized content, so this must stay bit-for-bit stable.
pub fn name_to_id(name: &str) -> i32 {
    name.encode_utf16()
        .fold(17i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}
