use super::{CallRelationship, MODULE_ROOT, StructuralElement};

/// Fills in `caller` and `caller_qualified_name` for every call: the innermost
/// named scope whose byte range contains the call site, or [`MODULE_ROOT`].
pub fn attribute_calls(elements: &[StructuralElement], calls: &mut [CallRelationship]) {
    for call in calls.iter_mut() {
        match innermost_scope(elements, call.start_byte) {
            Some(scope) => {
                call.caller = scope.name.clone();
                call.caller_qualified_name = scope.qualified_name.clone();
            }
            None => {
                call.caller = MODULE_ROOT.to_string();
                call.caller_qualified_name = MODULE_ROOT.to_string();
            }
        }
    }
}

/// Deepest scope-bearing, named element containing `byte`. Variables and
/// anonymous elements are passed through but never chosen.
pub fn innermost_scope(elements: &[StructuralElement], byte: usize) -> Option<&StructuralElement> {
    let mut found = None;
    let mut level = elements;
    while let Some(element) = level.iter().find(|e| e.contains_byte(byte)) {
        if element.element_type.is_scope() && !element.is_anonymous() {
            found = Some(element);
        }
        level = &element.children;
    }
    found
}
