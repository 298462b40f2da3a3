use phf::{Set, phf_set};

static HYDROGEN_SYMBOLS: Set<&'static str> = phf_set! {
    "H", "D", "T",
};

static OXYGEN_SYMBOLS: Set<&'static str> = phf_set! {
    "O",
};

pub fn is_hydrogen(element: &str) -> bool {
    HYDROGEN_SYMBOLS.contains(element.trim())
}

pub fn is_oxygen(element: &str) -> bool {
    OXYGEN_SYMBOLS.contains(element.trim())
}
