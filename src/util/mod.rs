mod mstring;

pub use mstring::MString;
