//! Fixed subject enumeration (the 50 US states).
//!
//! The order below is the ingestion order: batches slice this table into
//! contiguous chunks, so reordering it would invalidate every existing store.

/// One tracked entity. `code` is the lowercase postal abbreviation used by
/// the case API, `name` is the label used by the population table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    pub index: usize,
    pub code: &'static str,
    pub name: &'static str,
}

impl Subject {
    /// Surrogate id as stored in the `subjects` lookup table (1-based).
    pub fn id(&self) -> i64 {
        self.index as i64 + 1
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}

const STATES: [(&str, &str); 50] = [
    ("al", "Alabama"),
    ("ak", "Alaska"),
    ("az", "Arizona"),
    ("ar", "Arkansas"),
    ("ca", "California"),
    ("co", "Colorado"),
    ("ct", "Connecticut"),
    ("de", "Delaware"),
    ("fl", "Florida"),
    ("ga", "Georgia"),
    ("hi", "Hawaii"),
    ("id", "Idaho"),
    ("il", "Illinois"),
    ("in", "Indiana"),
    ("ia", "Iowa"),
    ("ks", "Kansas"),
    ("ky", "Kentucky"),
    ("la", "Louisiana"),
    ("me", "Maine"),
    ("md", "Maryland"),
    ("ma", "Massachusetts"),
    ("mi", "Michigan"),
    ("mn", "Minnesota"),
    ("ms", "Mississippi"),
    ("mo", "Missouri"),
    ("mt", "Montana"),
    ("ne", "Nebraska"),
    ("nv", "Nevada"),
    ("nh", "New Hampshire"),
    ("nj", "New Jersey"),
    ("nm", "New Mexico"),
    ("ny", "New York"),
    ("nc", "North Carolina"),
    ("nd", "North Dakota"),
    ("oh", "Ohio"),
    ("ok", "Oklahoma"),
    ("or", "Oregon"),
    ("pa", "Pennsylvania"),
    ("ri", "Rhode Island"),
    ("sc", "South Carolina"),
    ("sd", "South Dakota"),
    ("tn", "Tennessee"),
    ("tx", "Texas"),
    ("ut", "Utah"),
    ("vt", "Vermont"),
    ("va", "Virginia"),
    ("wa", "Washington"),
    ("wv", "West Virginia"),
    ("wi", "Wisconsin"),
    ("wy", "Wyoming"),
];

/// Ordered, immutable view over the subject table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectCatalog;

impl SubjectCatalog {
    pub const LEN: usize = STATES.len();

    pub fn len(&self) -> usize {
        Self::LEN
    }

    pub fn is_empty(&self) -> bool {
        Self::LEN == 0
    }

    pub fn get(&self, index: usize) -> Option<Subject> {
        STATES.get(index).map(|&(code, name)| Subject { index, code, name })
    }

    pub fn iter(&self) -> impl Iterator<Item = Subject> + '_ {
        (0..Self::LEN).filter_map(|i| self.get(i))
    }

    pub fn by_code(&self, code: &str) -> Option<Subject> {
        let code = code.to_ascii_lowercase();
        self.iter().find(|s| s.code == code)
    }

    pub fn by_name(&self, name: &str) -> Option<Subject> {
        self.iter().find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }
}
