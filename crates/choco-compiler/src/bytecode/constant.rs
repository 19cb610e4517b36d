//! Constant pool for compiled modules.
//!
//! Integer literals, string data and the symbolic references used by calls,
//! field accesses and casts all live here, deduplicated across the module.

use choco_core::SymbolHash;
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Integer literal (pushed as a primitive).
    Int(i64),
    /// UTF-8 string literal bytes (pushed as a boxed string).
    StringData(Vec<u8>),
    /// A callable entry: module functions and runtime helpers alike.
    Function {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// A module storage field.
    Field {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// A type descriptor, operand of a checked cast.
    Descriptor(String),
}

impl Constant {
    pub fn function(owner: &str, name: &str, descriptor: &str) -> Self {
        Constant::Function {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    pub fn field(owner: &str, name: &str, descriptor: &str) -> Self {
        Constant::Field {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    /// Link identity for function and field entries.
    pub fn symbol_hash(&self) -> Option<SymbolHash> {
        match self {
            Constant::Function {
                owner,
                name,
                descriptor,
            } => Some(SymbolHash::function(owner, name, descriptor)),
            Constant::Field { owner, name, .. } => Some(SymbolHash::field(owner, name)),
            _ => None,
        }
    }

    /// Tag byte used by the module encoding.
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Int(_) => 1,
            Constant::StringData(_) => 2,
            Constant::Function { .. } => 3,
            Constant::Field { .. } => 4,
            Constant::Descriptor(_) => 5,
        }
    }
}

/// Module-level constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<Constant, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        if let Some(&idx) = self.index.get(&constant) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant.clone());
        self.index.insert(constant, idx);
        idx
    }

    pub fn add_int(&mut self, value: i64) -> u32 {
        self.add(Constant::Int(value))
    }

    pub fn add_string(&mut self, data: Vec<u8>) -> u32 {
        self.add(Constant::StringData(data))
    }

    pub fn add_descriptor(&mut self, descriptor: impl Into<String>) -> u32 {
        self.add(Constant::Descriptor(descriptor.into()))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}

impl FromIterator<Constant> for ConstantPool {
    fn from_iter<I: IntoIterator<Item = Constant>>(iter: I) -> Self {
        let mut pool = ConstantPool::new();
        for constant in iter {
            // decoded pools are already unique; keep positions even if not
            let idx = pool.constants.len() as u32;
            pool.index.entry(constant.clone()).or_insert(idx);
            pool.constants.push(constant);
        }
        pool
    }
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.constants == other.constants
    }
}

impl Eq for ConstantPool {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_is_empty() {
        let pool = ConstantPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.get(0), None);
    }

    #[test]
    fn deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.add_int(42);
        let b = pool.add_string(b"hi".to_vec());
        let c = pool.add_int(42);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn function_and_field_with_same_name_are_distinct() {
        let mut pool = ConstantPool::new();
        let f = pool.add(Constant::function("m/Main", "x", "()V"));
        let g = pool.add(Constant::field("m/Main", "x", "()V"));
        assert_ne!(f, g);
        assert_ne!(
            pool.get(f).and_then(Constant::symbol_hash),
            pool.get(g).and_then(Constant::symbol_hash)
        );
    }

    #[test]
    fn collected_pool_keeps_order() {
        let pool: ConstantPool = vec![Constant::Int(1), Constant::Descriptor("V".into())]
            .into_iter()
            .collect();
        assert_eq!(pool.get(1), Some(&Constant::Descriptor("V".into())));
        assert_eq!(pool.len(), 2);
    }
}
