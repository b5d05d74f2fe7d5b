use std::collections::HashMap;

/// A unique identifier for an interned string, represented as a u32 for memory efficiency.
/// This provides type safety to prevent mixing string IDs with other integer values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(u32);

/// Type alias for better readability - InternedString is the same as StringId
pub type InternedString = StringId;

impl StringId {
    /// Convert the StringId to its underlying u32 value for serialization
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create a StringId from a u32 value for deserialization
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }

    /// Compare this interned string with a string slice efficiently without allocation.
    /// Requires access to the StringTable that created this ID.
    pub fn eq_str(self, table: &StringTable, other: &str) -> bool {
        table.resolve(self) == other
    }

    /// Resolve this interned string using the provided StringTable.
    /// This is a convenience method that delegates to StringTable::resolve.
    pub fn resolve<'a>(self, table: &'a StringTable) -> &'a str {
        table.resolve(self)
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StringId({})", self.0)
    }
}

/// A centralized string interning system that stores unique strings only once in memory.
///
/// Nominal type names, field names, procedure names and operator implementation
/// symbols all pass through here, so identity comparisons during resolution are
/// plain u32 comparisons.
///
/// The StringTable uses a dual-mapping approach:
/// - Vec<String> for O(1) ID→string resolution
/// - HashMap<String, StringId> for O(1) string→ID lookup during interning
#[derive(Debug, Clone)]
pub struct StringTable {
    /// Primary storage: ID → String mapping for fast resolution
    strings: Vec<String>,

    /// Reverse lookup: String → ID mapping for fast interning
    string_to_id: HashMap<String, StringId>,

    /// Next available string ID
    next_id: u32,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    /// Create a new empty string table
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            string_to_id: HashMap::new(),
            next_id: 0,
        }
    }

    /// Create a new string table with a specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: Vec::with_capacity(capacity),
            string_to_id: HashMap::with_capacity(capacity),
            next_id: 0,
        }
    }

    /// Intern a string slice, returning its unique ID.
    /// If the string already exists, returns the existing ID.
    pub fn intern(&mut self, s: &str) -> InternedString {
        if let Some(&existing_id) = self.string_to_id.get(s) {
            return existing_id;
        }

        let new_id = StringId(self.next_id);
        self.next_id += 1;

        self.strings.push(s.to_owned());
        self.string_to_id.insert(s.to_owned(), new_id);

        new_id
    }

    /// Resolve an interned string ID back to its string content.
    ///
    /// # Panics
    /// Panics if the StringId is invalid (not created by this StringTable)
    pub fn resolve(&self, id: InternedString) -> &str {
        self.strings
            .get(id.0 as usize)
            .map(|s| s.as_str())
            .unwrap_or_else(|| panic!("Invalid StringId: {}", id.0))
    }

    /// Efficiently intern a String by taking ownership, avoiding an extra allocation
    /// if the string is new. If the string already exists, the owned String is dropped
    /// and the existing ID is returned.
    pub fn get_or_intern(&mut self, s: String) -> InternedString {
        if let Some(&existing_id) = self.string_to_id.get(&s) {
            return existing_id;
        }

        let new_id = StringId(self.next_id);
        self.next_id += 1;

        self.string_to_id.insert(s.clone(), new_id);
        self.strings.push(s);

        new_id
    }

    /// Try to resolve an interned string ID, returning None if the ID is invalid
    /// instead of panicking.
    pub fn try_resolve(&self, id: InternedString) -> Option<&str> {
        self.strings.get(id.0 as usize).map(|s| s.as_str())
    }

    /// Check if a string is already interned without interning it.
    /// Returns the StringId if found, None otherwise.
    pub fn get_existing(&self, s: &str) -> Option<InternedString> {
        self.string_to_id.get(s).copied()
    }

    /// Get the number of unique strings stored in the table
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the string table is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
