use std::fmt::{Display, Formatter};
use std::ops::Deref;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjString(pub String);

impl Display for ObjString {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Deref for ObjString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}
