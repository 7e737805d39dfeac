//! The C standard-library subset exposed to scripts. Every entry is an
//! ordinary host registration; the interpreter knows nothing about it.

pub mod cstdlib;
pub mod ctype;
pub mod errno;
pub mod math;
pub mod stdbool;
pub mod stdio;
pub mod string;
pub mod time;

use super::Library;
use crate::error::BindingError;

/// Register every standard header.
pub fn register(library: &mut Library) -> Result<(), BindingError> {
    ctype::register(library)?;
    errno::register(library)?;
    math::register(library)?;
    stdbool::register(library)?;
    stdio::register(library)?;
    cstdlib::register(library)?;
    string::register(library)?;
    time::register(library)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::heap::Heap;
    use crate::library::{marshal, HostContext, HostState, Library};
    use crate::types::TypeRegistry;
    use crate::value::Value;

    /// Minimal harness that calls one registered host function directly.
    pub struct Harness {
        pub library: Library,
        pub heap: Heap,
        pub types: TypeRegistry,
        pub state: HostState,
    }

    impl Harness {
        pub fn new() -> Self {
            let mut library = Library::new();
            super::register(&mut library).unwrap();
            let types = crate::resolver::host_types(&library);
            Self {
                library,
                heap: Heap::new(),
                types,
                state: HostState::new(true),
            }
        }

        pub fn call(&mut self, name: &str, args: Vec<Value>) -> Value {
            self.try_call(name, args).unwrap()
        }

        pub fn try_call(
            &mut self,
            name: &str,
            args: Vec<Value>,
        ) -> Result<Value, crate::error::BindingError> {
            let function = self.library.host_function(name).unwrap().clone();
            let args = marshal::marshal_arguments(&function.signature, args, &self.types)?;
            let mut context = HostContext::new(&self.heap, &self.types, &mut self.state);
            let result = function.invoke(&mut context, args)?;
            marshal::marshal_return(&function.signature, result, &self.types)
        }
    }
}
