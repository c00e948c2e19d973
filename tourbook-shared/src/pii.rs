use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Customer contact data that must not leak into log lines.
///
/// `Debug` and `Display` only reveal the last four characters; serialization
/// is transparent so documents and API responses carry the real value.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Masked<T>(pub T);

const VISIBLE_TAIL: usize = 4;

fn masked_tail(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= VISIBLE_TAIL {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - VISIBLE_TAIL..].iter().collect();
    format!("****{}", tail)
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", masked_tail(&self.0.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", masked_tail(&self.0.to_string()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Masked<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Masked)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}
