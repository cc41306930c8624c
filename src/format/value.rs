// Numeric coercion for display
//
// Formatters accept anything that might hold a number: plain numerics,
// numeric strings, JSON values and options of those. Coercion never fails
// loudly; anything non-finite or non-numeric is simply "no number".

use serde_json::Value;

pub trait AsNumber {
    /// The finite number this value represents, if any
    fn as_number(&self) -> Option<f64>;
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Parse a numeric string, rejecting empty input and textual infinities/NaN
pub fn parse_numeric_str(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().and_then(finite)
}

macro_rules! as_number_for_primitive {
    ($($t:ty),*) => {
        $(
            impl AsNumber for $t {
                fn as_number(&self) -> Option<f64> {
                    finite(*self as f64)
                }
            }
        )*
    };
}

as_number_for_primitive!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl AsNumber for str {
    fn as_number(&self) -> Option<f64> {
        parse_numeric_str(self)
    }
}

impl AsNumber for String {
    fn as_number(&self) -> Option<f64> {
        parse_numeric_str(self)
    }
}

impl AsNumber for Value {
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64().and_then(finite),
            Value::String(s) => parse_numeric_str(s),
            _ => None,
        }
    }
}

impl<T: AsNumber> AsNumber for Option<T> {
    fn as_number(&self) -> Option<f64> {
        self.as_ref().and_then(AsNumber::as_number)
    }
}

impl<T: AsNumber + ?Sized> AsNumber for &T {
    fn as_number(&self) -> Option<f64> {
        (**self).as_number()
    }
}
