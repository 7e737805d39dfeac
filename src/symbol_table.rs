use crate::error::{ResolutionError, ResolveResult, SourceLocation};
use std::collections::HashMap;

pub type ScopeId = usize;
pub type SymbolId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable { constant: bool },
    Parameter,
    /// `defined` is false for a C++ prototype still waiting for its body.
    Function { defined: bool },
    Class,
    Enum,
    /// Member of an unscoped enum, visible at unit level.
    EnumMember { value: i64 },
    /// Anything registered by the host library.
    Host,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope_id: ScopeId,
    pub declared_at: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeKind {
    Unit,
    Function { name: String },
    Block,
    ForLoop,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub symbols: HashMap<String, SymbolId>,
    pub depth: usize,
}

impl Scope {
    pub fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>, depth: usize) -> Self {
        Self {
            id,
            kind,
            parent,
            children: Vec::new(),
            symbols: HashMap::new(),
            depth,
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols.get(name).copied()
    }
}

/// Lexical scope tree of one compilation unit. The resolver walks the
/// program once, entering and leaving scopes exactly where the evaluator
/// will push and pop them at run time.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    current_scope: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(0, ScopeKind::Unit, None, 0)],
            symbols: Vec::new(),
            current_scope: 0,
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let scope_id = self.scopes.len();
        let depth = self.scopes[self.current_scope].depth + 1;
        self.scopes[self.current_scope].children.push(scope_id);
        self.scopes
            .push(Scope::new(scope_id, kind, Some(self.current_scope), depth));
        self.current_scope = scope_id;
        scope_id
    }

    pub fn exit_scope(&mut self) -> ScopeId {
        match self.scopes[self.current_scope].parent {
            Some(parent) => {
                self.current_scope = parent;
                parent
            }
            None => crate::internal_error!("exited the unit scope"),
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current_scope
    }

    pub fn unit_scope(&self) -> ScopeId {
        0
    }

    pub fn get_scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn get_symbol_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id)
    }

    /// Declare in the current scope; a second declaration of the same name
    /// in one scope is an error.
    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        location: SourceLocation,
    ) -> ResolveResult<SymbolId> {
        if self.lookup_current_scope(name).is_some() {
            return Err(ResolutionError::Duplicate {
                name: name.to_string(),
                location,
            });
        }
        let symbol_id = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            scope_id: self.current_scope,
            declared_at: location,
        });
        self.scopes[self.current_scope]
            .symbols
            .insert(name.to_string(), symbol_id);
        Ok(symbol_id)
    }

    /// Look up a symbol by name, searching from the current scope outwards.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope_id = Some(self.current_scope);
        while let Some(id) = scope_id {
            let scope = &self.scopes[id];
            if let Some(symbol_id) = scope.get_symbol(name) {
                return Some(symbol_id);
            }
            scope_id = scope.parent;
        }
        None
    }

    pub fn lookup_current_scope(&self, name: &str) -> Option<SymbolId> {
        self.scopes[self.current_scope].get_symbol(name)
    }

    pub fn symbols_in_scope(&self, scope_id: ScopeId) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self
            .get_scope(scope_id)
            .map(|scope| scope.symbols.values().map(|id| &self.symbols[*id]).collect())
            .unwrap_or_default();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols
    }

    /// Functions declared with a prototype but never given a body.
    pub fn undefined_functions(&self) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|symbol| symbol.kind == SymbolKind::Function { defined: false })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize) -> SourceLocation {
        SourceLocation::new(line, 1, 0)
    }

    #[test]
    fn test_scope_management() {
        let mut table = SymbolTable::new();
        let function = table.enter_scope(ScopeKind::Function { name: "f".to_string() });
        assert_eq!(function, 1);
        let block = table.enter_scope(ScopeKind::Block);
        assert_eq!(block, 2);
        assert_eq!(table.get_scope(block).unwrap().depth, 2);
        assert_eq!(table.exit_scope(), 1);
        assert_eq!(table.exit_scope(), 0);
        assert_eq!(table.get_scope(0).unwrap().children, vec![1]);
    }

    #[test]
    fn test_scope_shadowing() {
        let mut table = SymbolTable::new();
        let global = table
            .declare("x", SymbolKind::Variable { constant: false }, at(1))
            .unwrap();
        table.enter_scope(ScopeKind::Block);
        let local = table.declare("x", SymbolKind::Parameter, at(2)).unwrap();
        assert_eq!(table.lookup("x"), Some(local));
        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(global));
        assert_eq!(table.lookup("missing"), None);
    }

    #[test]
    fn test_redeclaration_in_one_scope_is_an_error() {
        let mut table = SymbolTable::new();
        table.declare("Point", SymbolKind::Class, at(1)).unwrap();
        let err = table
            .declare("Point", SymbolKind::Function { defined: true }, at(4))
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Duplicate {
                name: "Point".to_string(),
                location: at(4)
            }
        );
    }

    #[test]
    fn test_prototype_tracking() {
        let mut table = SymbolTable::new();
        let id = table
            .declare("f", SymbolKind::Function { defined: false }, at(1))
            .unwrap();
        table.declare("g", SymbolKind::Function { defined: false }, at(2)).unwrap();
        table.get_symbol_mut(id).unwrap().kind = SymbolKind::Function { defined: true };
        let names: Vec<&str> = table.undefined_functions().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["g"]);
        assert_eq!(table.symbols_in_scope(0).len(), 2);
    }
}
