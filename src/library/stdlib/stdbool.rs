use crate::error::BindingError;
use crate::library::Library;
use crate::types::Type;

pub fn register(library: &mut Library) -> Result<(), BindingError> {
    library.constant("__bool_true_false_are_defined", Type::Int, 1i64)?;
    Ok(())
}
