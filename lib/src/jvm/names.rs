use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields, and local variables
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in internal form (`java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name)?;
        Ok(BinaryName(Cow::Owned(name)))
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // JDK names used when lowering dynamic constants
    pub const LOOKUP: Self = Self::name("lookup");
    pub const METAFACTORY: Self = Self::name("metafactory");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    /// Dotted source-level form of the name (`java.lang.Object`)
    pub fn to_java_name(&self) -> String {
        self.as_str().replace('/', ".")
    }

    // JDK names
    pub const ARITHMETICEXCEPTION: Self = Self::name("java/lang/ArithmeticException");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const INDEXOUTOFBOUNDSEXCEPTION: Self = Self::name("java/lang/IndexOutOfBoundsException");
    pub const LAMBDAMETAFACTORY: Self = Self::name("java/lang/invoke/LambdaMetafactory");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODHANDLES: Self = Self::name("java/lang/invoke/MethodHandles");
    pub const METHODHANDLES_LOOKUP: Self = Self::name("java/lang/invoke/MethodHandles$Lookup");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const NEGATIVEARRAYSIZEEXCEPTION: Self =
        Self::name("java/lang/NegativeArraySizeException");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation() {
        assert!(UnqualifiedName::from_string(String::from("foo")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("foo/bar")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
        assert!(BinaryName::from_string(String::from("java/lang/Object")).is_ok());
        assert!(BinaryName::from_string(String::from("java//Object")).is_err());
    }

    #[test]
    fn java_names() {
        assert_eq!(BinaryName::OBJECT.to_java_name(), "java.lang.Object");
        assert_eq!(
            BinaryName::METHODHANDLES_LOOKUP.to_java_name(),
            "java.lang.invoke.MethodHandles$Lookup"
        );
    }
}
