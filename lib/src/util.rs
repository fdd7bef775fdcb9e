/// Values that occupy a variable number of JVM local variable or operand stack slots
///
/// `long` and `double` take two slots, everything else takes one.
pub trait Width {
    fn width(&self) -> usize;
}
