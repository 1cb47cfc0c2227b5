pub fn is_zero(x: &usize) -> bool {
    *x == 0
}
