use crate::ir::TypeName;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Subtyping and method-signature queries needed for exception analysis
pub trait ClassHierarchy {
    /// Is `sub` the same class as `sup` or one of its (transitive) subclasses?
    ///
    /// Classes the hierarchy does not know about are only subclasses of themselves and
    /// `java.lang.Object`.
    fn is_subclass(&self, sub: &TypeName, sup: &TypeName) -> bool;

    /// Checked exceptions declared by a method
    ///
    /// Fails with a not-found error when the owner or the method is unknown.
    fn method_exceptions(
        &self,
        owner: &TypeName,
        name: &str,
        argument_types: &[TypeName],
    ) -> Result<Vec<TypeName>>;
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct MethodKey {
    name: String,
    argument_types: Vec<TypeName>,
}

#[derive(Clone, Default, Debug)]
struct ClassData {
    superclass: Option<TypeName>,
    methods: HashMap<MethodKey, Vec<TypeName>>,
}

/// In-memory class hierarchy
///
/// [`SimpleHierarchy::new`] comes preloaded with `java.lang.Object` and the exception classes
/// that the exception resolver can report, so it is usable as-is for methods which only throw
/// runtime exceptions.
#[derive(Clone, Debug)]
pub struct SimpleHierarchy {
    classes: HashMap<TypeName, ClassData>,
}

impl SimpleHierarchy {
    /// Hierarchy containing only the standard exception classes
    pub fn new() -> SimpleHierarchy {
        let mut hierarchy = SimpleHierarchy {
            classes: HashMap::new(),
        };
        hierarchy.insert_lang_types();
        hierarchy
    }

    /// Add standard types to the hierarchy
    fn insert_lang_types(&mut self) {
        self.classes.insert(TypeName::OBJECT, ClassData::default());
        let edges = [
            (TypeName::THROWABLE, TypeName::OBJECT),
            (TypeName::EXCEPTION, TypeName::THROWABLE),
            (TypeName::ERROR, TypeName::THROWABLE),
            (TypeName::RUNTIME_EXCEPTION, TypeName::EXCEPTION),
            (TypeName::NULL_POINTER_EXCEPTION, TypeName::RUNTIME_EXCEPTION),
            (TypeName::ARITHMETIC_EXCEPTION, TypeName::RUNTIME_EXCEPTION),
            (TypeName::CLASS_CAST_EXCEPTION, TypeName::RUNTIME_EXCEPTION),
            (
                TypeName::NEGATIVE_ARRAY_SIZE_EXCEPTION,
                TypeName::RUNTIME_EXCEPTION,
            ),
            (
                TypeName::INDEX_OUT_OF_BOUNDS_EXCEPTION,
                TypeName::RUNTIME_EXCEPTION,
            ),
            (
                TypeName::new("java.lang.ArrayIndexOutOfBoundsException"),
                TypeName::INDEX_OUT_OF_BOUNDS_EXCEPTION,
            ),
            (
                TypeName::new("java.lang.IllegalArgumentException"),
                TypeName::RUNTIME_EXCEPTION,
            ),
            (
                TypeName::new("java.lang.IllegalStateException"),
                TypeName::RUNTIME_EXCEPTION,
            ),
            (
                TypeName::new("java.lang.ReflectiveOperationException"),
                TypeName::EXCEPTION,
            ),
            (TypeName::new("java.io.IOException"), TypeName::EXCEPTION),
            (
                TypeName::new("java.lang.InterruptedException"),
                TypeName::EXCEPTION,
            ),
            (
                TypeName::new("java.lang.VirtualMachineError"),
                TypeName::ERROR,
            ),
            (
                TypeName::new("java.lang.OutOfMemoryError"),
                TypeName::new("java.lang.VirtualMachineError"),
            ),
            (
                TypeName::new("java.lang.StackOverflowError"),
                TypeName::new("java.lang.VirtualMachineError"),
            ),
            (TypeName::new("java.lang.LinkageError"), TypeName::ERROR),
        ];
        for (class, superclass) in edges {
            self.add_class(class, Some(superclass));
        }
    }

    /// Declare a class (or redeclare its superclass)
    pub fn add_class(&mut self, class: TypeName, superclass: Option<TypeName>) -> &mut Self {
        self.classes.entry(class).or_default().superclass = superclass;
        self
    }

    /// Declare a method and the checked exceptions in its `throws` clause
    ///
    /// The owner is declared as a direct subclass of `java.lang.Object` if it is not yet known.
    pub fn add_method(
        &mut self,
        owner: TypeName,
        name: impl Into<String>,
        argument_types: Vec<TypeName>,
        exceptions: Vec<TypeName>,
    ) -> &mut Self {
        let class = self.classes.entry(owner).or_insert_with(|| ClassData {
            superclass: Some(TypeName::OBJECT),
            methods: HashMap::new(),
        });
        let key = MethodKey {
            name: name.into(),
            argument_types,
        };
        class.methods.insert(key, exceptions);
        self
    }

    pub fn contains(&self, class: &TypeName) -> bool {
        self.classes.contains_key(class)
    }
}

impl Default for SimpleHierarchy {
    fn default() -> SimpleHierarchy {
        SimpleHierarchy::new()
    }
}

impl ClassHierarchy for SimpleHierarchy {
    fn is_subclass(&self, sub: &TypeName, sup: &TypeName) -> bool {
        if sup == &TypeName::OBJECT {
            return !sub.is_primitive();
        }

        // Walk up superclass edges, guarding against cycles from bad declarations
        let mut dont_revisit: HashSet<&TypeName> = HashSet::new();
        let mut next: Option<&TypeName> = Some(sub);
        while let Some(class) = next {
            if class == sup {
                return true;
            }
            if !dont_revisit.insert(class) {
                break;
            }
            next = self
                .classes
                .get(class)
                .and_then(|data| data.superclass.as_ref());
        }
        false
    }

    fn method_exceptions(
        &self,
        owner: &TypeName,
        name: &str,
        argument_types: &[TypeName],
    ) -> Result<Vec<TypeName>> {
        let key = MethodKey {
            name: name.to_owned(),
            argument_types: argument_types.to_vec(),
        };

        // Methods are inherited, so search up the superclass chain
        let mut dont_revisit: HashSet<&TypeName> = HashSet::new();
        let mut next: Option<&TypeName> = Some(owner);
        let mut found_owner = false;
        while let Some(class) = next {
            if !dont_revisit.insert(class) {
                break;
            }
            match self.classes.get(class) {
                None => break,
                Some(data) => {
                    found_owner = true;
                    if let Some(exceptions) = data.methods.get(&key) {
                        return Ok(exceptions.clone());
                    }
                    next = data.superclass.as_ref();
                }
            }
        }

        if found_owner {
            let arguments: Vec<&str> = argument_types.iter().map(TypeName::as_str).collect();
            Err(Error::MethodNotFound(format!(
                "{}.{}({})",
                owner,
                name,
                arguments.join(", ")
            )))
        } else {
            Err(Error::ClassNotFound(owner.to_string()))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exception_hierarchy() {
        let hierarchy = SimpleHierarchy::new();
        assert!(hierarchy.is_subclass(&TypeName::NULL_POINTER_EXCEPTION, &TypeName::THROWABLE));
        assert!(hierarchy.is_subclass(&TypeName::ERROR, &TypeName::THROWABLE));
        assert!(hierarchy.is_subclass(&TypeName::ERROR, &TypeName::ERROR));
        assert!(!hierarchy.is_subclass(&TypeName::ERROR, &TypeName::EXCEPTION));
        assert!(!hierarchy.is_subclass(&TypeName::THROWABLE, &TypeName::RUNTIME_EXCEPTION));
        assert!(hierarchy.is_subclass(&TypeName::new("com.acme.Unknown"), &TypeName::OBJECT));
        assert!(!hierarchy.is_subclass(
            &TypeName::new("com.acme.Unknown"),
            &TypeName::THROWABLE
        ));
    }

    #[test]
    fn user_classes() {
        let mut hierarchy = SimpleHierarchy::new();
        let failure = TypeName::new("com.acme.Failure");
        hierarchy.add_class(failure.clone(), Some(TypeName::new("java.io.IOException")));
        assert!(hierarchy.is_subclass(&failure, &TypeName::EXCEPTION));
        assert!(!hierarchy.is_subclass(&failure, &TypeName::RUNTIME_EXCEPTION));
    }

    #[test]
    fn inherited_method_exceptions() {
        let mut hierarchy = SimpleHierarchy::new();
        let base = TypeName::new("com.acme.Base");
        let derived = TypeName::new("com.acme.Derived");
        let io = TypeName::new("java.io.IOException");
        hierarchy
            .add_method(base.clone(), "read", vec![TypeName::INT], vec![io.clone()])
            .add_class(derived.clone(), Some(base));

        assert_eq!(
            hierarchy
                .method_exceptions(&derived, "read", &[TypeName::INT])
                .unwrap(),
            vec![io]
        );

        let missing = hierarchy.method_exceptions(&derived, "write", &[]);
        assert!(matches!(missing, Err(Error::MethodNotFound(_))));

        let unknown = hierarchy.method_exceptions(&TypeName::new("com.acme.Nope"), "run", &[]);
        assert!(matches!(unknown, Err(ref err) if err.is_not_found()));
    }
}
