/// Rounds floating point readings to the integers sent on the wire.
pub trait ToRounded {
    /// Rounds to the nearest integer, half away from zero.
    ///
    /// `NaN` rounds to zero; infinities saturate.
    fn to_rounded(self) -> i64;
}

impl ToRounded for f64 {
    #[expect(clippy::cast_possible_truncation)]
    fn to_rounded(self) -> i64 {
        if self.is_nan() {
            0
        } else {
            // `as` saturates at the bounds of `i64`.
            self.round() as i64
        }
    }
}
