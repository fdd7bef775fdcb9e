//! Symbolic type names and the small type lattice used while simulating frames
//!
//! Types are named the way they are written in source (`int`, `java.lang.String`, `byte[][]`).
//! Besides the usual primitive and reference types, there are three pseudo-types that only show up
//! during frame simulation:
//!
//!   - `null`, the type of the `null` literal (which counts as primitive, much like `void`)
//!   - `TOP`, the type of an unusable slot
//!   - `UNINIT_THIS`, the type of `this` in a constructor before the super constructor call

use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RefType};
use std::borrow::Cow;
use std::fmt;

/// Name of a (possibly primitive or array) type
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TypeName(Cow<'static, str>);

impl TypeName {
    const fn name(value: &'static str) -> TypeName {
        TypeName(Cow::Borrowed(value))
    }

    pub fn new(name: impl Into<String>) -> TypeName {
        TypeName(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    pub const BOOLEAN: Self = Self::name("boolean");
    pub const BYTE: Self = Self::name("byte");
    pub const CHAR: Self = Self::name("char");
    pub const SHORT: Self = Self::name("short");
    pub const INT: Self = Self::name("int");
    pub const LONG: Self = Self::name("long");
    pub const FLOAT: Self = Self::name("float");
    pub const DOUBLE: Self = Self::name("double");
    pub const VOID: Self = Self::name("void");

    pub const NULL: Self = Self::name("null");
    pub const TOP: Self = Self::name("TOP");
    pub const UNINIT_THIS: Self = Self::name("UNINIT_THIS");

    pub const OBJECT: Self = Self::name("java.lang.Object");
    pub const STRING: Self = Self::name("java.lang.String");
    pub const CLASS: Self = Self::name("java.lang.Class");
    pub const THROWABLE: Self = Self::name("java.lang.Throwable");
    pub const EXCEPTION: Self = Self::name("java.lang.Exception");
    pub const ERROR: Self = Self::name("java.lang.Error");
    pub const RUNTIME_EXCEPTION: Self = Self::name("java.lang.RuntimeException");
    pub const NULL_POINTER_EXCEPTION: Self = Self::name("java.lang.NullPointerException");
    pub const ARITHMETIC_EXCEPTION: Self = Self::name("java.lang.ArithmeticException");
    pub const CLASS_CAST_EXCEPTION: Self = Self::name("java.lang.ClassCastException");
    pub const NEGATIVE_ARRAY_SIZE_EXCEPTION: Self =
        Self::name("java.lang.NegativeArraySizeException");
    pub const INDEX_OUT_OF_BOUNDS_EXCEPTION: Self =
        Self::name("java.lang.IndexOutOfBoundsException");
    pub const METHOD_HANDLE: Self = Self::name("java.lang.invoke.MethodHandle");
    pub const METHOD_HANDLES: Self = Self::name("java.lang.invoke.MethodHandles");
    pub const METHOD_HANDLES_LOOKUP: Self = Self::name("java.lang.invoke.MethodHandles$Lookup");
    pub const METHOD_TYPE: Self = Self::name("java.lang.invoke.MethodType");
    pub const LAMBDA_METAFACTORY: Self = Self::name("java.lang.invoke.LambdaMetafactory");

    /// Primitive types, `void`, and `null`
    pub fn is_primitive(&self) -> bool {
        matches!(
            self.as_str(),
            "boolean"
                | "byte"
                | "char"
                | "short"
                | "int"
                | "long"
                | "float"
                | "double"
                | "void"
                | "null"
        )
    }

    pub fn is_array(&self) -> bool {
        self.as_str().ends_with("[]")
    }

    /// Neither primitive nor array
    pub fn is_class(&self) -> bool {
        !self.is_primitive() && !self.is_array()
    }

    /// Does a value of this type take up two slots?
    pub fn is_dword(&self) -> bool {
        *self == TypeName::LONG || *self == TypeName::DOUBLE
    }

    /// Type of the elements of an array type (`null` is its own element type)
    pub fn element_type_opt(&self) -> Option<TypeName> {
        if *self == TypeName::NULL {
            Some(TypeName::NULL)
        } else {
            self.as_str()
                .strip_suffix("[]")
                .map(|element| TypeName::new(element))
        }
    }

    /// Type of the elements of an array type, or the type itself for non-arrays
    pub fn element_type(&self) -> TypeName {
        self.element_type_opt().unwrap_or_else(|| self.clone())
    }

    pub fn as_array(&self, dimensions: usize) -> TypeName {
        TypeName::new(format!("{}{}", self.as_str(), "[]".repeat(dimensions)))
    }

    pub fn from_binary_name(name: &BinaryName) -> TypeName {
        TypeName::new(name.to_java_name())
    }

    /// Type of the result of calling a method with this descriptor (`void` when there is none)
    pub fn return_type(descriptor: &MethodDescriptor<BinaryName>) -> TypeName {
        descriptor
            .return_type
            .as_ref()
            .map_or(TypeName::VOID, TypeName::from)
    }

    pub fn parameter_types(descriptor: &MethodDescriptor<BinaryName>) -> Vec<TypeName> {
        descriptor.parameters.iter().map(TypeName::from).collect()
    }

    /// Can values of the two types share a register?
    ///
    /// They must agree on primitive-ness, and on width if primitive.
    pub fn is_compatible_with(&self, other: &TypeName) -> bool {
        match (self.is_primitive(), other.is_primitive()) {
            (true, true) => self.is_dword() == other.is_dword(),
            (false, false) => true,
            _ => false,
        }
    }

    /// Least upper bound of two types at a control-flow join
    ///
    /// Any two distinct reference types join to `java.lang.Object`. Joins that cannot be
    /// expressed produce `TOP`.
    pub fn lub(&self, other: &TypeName) -> TypeName {
        if self == other {
            self.clone()
        } else if *self == TypeName::TOP || *other == TypeName::TOP {
            TypeName::TOP
        } else if self.is_primitive() {
            Self::primitive_lub(self, other)
        } else if other.is_primitive() {
            Self::primitive_lub(other, self)
        } else {
            TypeName::OBJECT
        }
    }

    fn primitive_lub(primitive: &TypeName, other: &TypeName) -> TypeName {
        if *primitive == TypeName::NULL {
            if other.is_primitive() {
                TypeName::TOP
            } else {
                other.clone()
            }
        } else if !other.is_primitive() {
            TypeName::TOP
        } else if primitive.is_int_like() && other.is_int_like() {
            TypeName::INT
        } else {
            TypeName::TOP
        }
    }

    /// Types the JVM stores as an `int` in locals and on the stack
    pub fn is_int_like(&self) -> bool {
        matches!(self.as_str(), "boolean" | "byte" | "char" | "short" | "int")
    }

    /// Position of a primitive type in the numeric promotion order
    fn promotion_weight(&self) -> u8 {
        match self.as_str() {
            "boolean" => 0,
            "byte" | "char" => 1,
            "short" => 2,
            "int" => 3,
            "long" => 4,
            "float" => 5,
            "double" => 6,
            _ => 0,
        }
    }

    /// The wider of two primitive types (ties go to `self`)
    pub fn wider(&self, other: &TypeName) -> TypeName {
        if self.promotion_weight() >= other.promotion_weight() {
            self.clone()
        } else {
            other.clone()
        }
    }

    /// Result type of a binary operation whose left operand has type `self`
    ///
    /// Narrow integer types promote to `int`; references pass through.
    pub fn binary_result(&self, right: &TypeName) -> TypeName {
        if self.is_primitive() {
            let widest = self.wider(right);
            if widest.promotion_weight() <= TypeName::INT.promotion_weight() {
                TypeName::INT
            } else {
                widest
            }
        } else {
            self.clone()
        }
    }
}

impl From<BaseType> for TypeName {
    fn from(base_type: BaseType) -> TypeName {
        TypeName::name(base_type.java_name())
    }
}

impl From<&RefType<BinaryName>> for TypeName {
    fn from(ref_type: &RefType<BinaryName>) -> TypeName {
        match ref_type {
            RefType::Object(name) => TypeName::from_binary_name(name),
            RefType::ObjectArray(arr) => {
                TypeName::from_binary_name(&arr.element_type).as_array(arr.dimensions())
            }
            RefType::PrimitiveArray(arr) => {
                TypeName::from(arr.element_type).as_array(arr.dimensions())
            }
        }
    }
}

impl From<&FieldType<BinaryName>> for TypeName {
    fn from(field_type: &FieldType<BinaryName>) -> TypeName {
        match field_type {
            FieldType::Base(base_type) => TypeName::from(*base_type),
            FieldType::Ref(ref_type) => TypeName::from(ref_type),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;

    fn named(name: &str) -> TypeName {
        TypeName::new(name)
    }

    #[test]
    fn from_descriptors() {
        let parse = |desc: &str| TypeName::from(&FieldType::<BinaryName>::parse(desc).unwrap());
        assert_eq!(parse("I"), TypeName::INT);
        assert_eq!(parse("Ljava/lang/String;"), TypeName::STRING);
        assert_eq!(parse("[[J"), named("long[][]"));
        assert_eq!(parse("[Ljava/lang/Object;"), named("java.lang.Object[]"));
    }

    #[test]
    fn element_types() {
        assert_eq!(named("int[][]").element_type(), named("int[]"));
        assert_eq!(TypeName::NULL.element_type(), TypeName::NULL);
        assert_eq!(TypeName::STRING.element_type(), TypeName::STRING);
        assert_eq!(TypeName::INT.as_array(2), named("int[][]"));
    }

    #[test]
    fn lub() {
        assert_eq!(TypeName::INT.lub(&TypeName::INT), TypeName::INT);
        assert_eq!(TypeName::INT.lub(&TypeName::BYTE), TypeName::INT);
        assert_eq!(TypeName::SHORT.lub(&TypeName::INT), TypeName::INT);
        assert_eq!(TypeName::BYTE.lub(&TypeName::CHAR), TypeName::INT);
        assert_eq!(TypeName::CHAR.lub(&TypeName::SHORT), TypeName::INT);
        assert_eq!(TypeName::BOOLEAN.lub(&TypeName::BYTE), TypeName::INT);
        assert_eq!(TypeName::CHAR.lub(&TypeName::CHAR), TypeName::CHAR);
        assert_eq!(TypeName::SHORT.lub(&TypeName::LONG), TypeName::TOP);
        assert_eq!(TypeName::INT.lub(&TypeName::FLOAT), TypeName::TOP);
        assert_eq!(TypeName::LONG.lub(&TypeName::DOUBLE), TypeName::TOP);
        assert_eq!(TypeName::NULL.lub(&TypeName::STRING), TypeName::STRING);
        assert_eq!(TypeName::STRING.lub(&TypeName::NULL), TypeName::STRING);
        assert_eq!(TypeName::NULL.lub(&TypeName::INT), TypeName::TOP);
        assert_eq!(TypeName::STRING.lub(&TypeName::INT), TypeName::TOP);
        assert_eq!(TypeName::STRING.lub(&TypeName::CLASS), TypeName::OBJECT);
        assert_eq!(TypeName::TOP.lub(&TypeName::STRING), TypeName::TOP);
    }

    #[test]
    fn promotion() {
        assert_eq!(TypeName::BYTE.binary_result(&TypeName::SHORT), TypeName::INT);
        assert_eq!(TypeName::INT.binary_result(&TypeName::LONG), TypeName::LONG);
        assert_eq!(TypeName::DOUBLE.binary_result(&TypeName::INT), TypeName::DOUBLE);
        assert_eq!(TypeName::STRING.binary_result(&TypeName::INT), TypeName::STRING);
        assert_eq!(TypeName::BYTE.wider(&TypeName::INT), TypeName::INT);
        assert_eq!(TypeName::FLOAT.wider(&TypeName::INT), TypeName::FLOAT);
    }

    #[test]
    fn compatibility() {
        assert!(TypeName::INT.is_compatible_with(&TypeName::BOOLEAN));
        assert!(!TypeName::INT.is_compatible_with(&TypeName::LONG));
        assert!(TypeName::STRING.is_compatible_with(&TypeName::OBJECT));
        assert!(!TypeName::STRING.is_compatible_with(&TypeName::INT));
        assert!(TypeName::NULL.is_primitive());
        assert!(!TypeName::TOP.is_primitive());
    }
}
