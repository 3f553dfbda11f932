//! Runtime classes the evaluator needs before it can build certain values.
//!
//! `System.Decimal` has no IL literal form, so a `1.5m` literal is built by
//! instantiating the class directly. Methods invoked on primitive values are
//! looked up on their value classes. Both are located once, when the core
//! library loads.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::runtime::{ClassHandle, ValueInspector};
use crate::types::{file_name_of, ModuleId, ModuleInfo};

/// File name of the module that defines the predefined types.
pub const CORE_LIBRARY: &str = "System.Private.CoreLib.dll";

/// Class name of `decimal`.
pub const DECIMAL_CLASS: &str = "System.Decimal";

/// Value classes of the primitive types.
const VALUE_CLASSES: [&str; 13] = [
    "System.Boolean",
    "System.Char",
    "System.SByte",
    "System.Byte",
    "System.Int16",
    "System.UInt16",
    "System.Int32",
    "System.UInt32",
    "System.Int64",
    "System.UInt64",
    "System.Single",
    "System.Double",
    "System.String",
];

/// Cached class handles, filled on core library load.
#[derive(Debug, Clone, Default)]
pub struct PredefinedTypes
{
    decimal: Option<ClassHandle>,
    value_classes: HashMap<&'static str, ClassHandle>,
}

impl PredefinedTypes
{
    /// Whether `module` is the core library.
    #[must_use]
    pub fn is_core_library(module: &ModuleInfo) -> bool
    {
        file_name_of(&module.name) == CORE_LIBRARY || file_name_of(&module.path) == CORE_LIBRARY
    }

    /// Look the classes up in `module`.
    pub fn find(inspector: &dyn ValueInspector, module: ModuleId) -> Result<Self>
    {
        let decimal = inspector.find_class(Some(module), DECIMAL_CLASS)?;
        if decimal.is_none() {
            warn!("{DECIMAL_CLASS} not found in the core library");
        }

        let mut value_classes = HashMap::new();
        for name in VALUE_CLASSES {
            if let Some(class) = inspector.find_class(Some(module), name)? {
                value_classes.insert(name, class);
            }
        }
        debug!("Cached {} predefined value classes", value_classes.len());

        Ok(Self { decimal, value_classes })
    }

    #[must_use]
    pub fn decimal(&self) -> Option<ClassHandle>
    {
        self.decimal
    }

    /// Value class of a primitive type, by runtime type name.
    #[must_use]
    pub fn value_class(&self, type_name: &str) -> Option<ClassHandle>
    {
        self.value_classes.get(type_name).copied()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool
    {
        self.decimal.is_some() || !self.value_classes.is_empty()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_core_library_detection()
    {
        let module = ModuleInfo {
            id: ModuleId(1),
            name: "System.Private.CoreLib.dll".into(),
            path: "/usr/share/dotnet/shared/Microsoft.NETCore.App/8.0.0/System.Private.CoreLib.dll".into(),
            is_dynamic: false,
        };
        assert!(PredefinedTypes::is_core_library(&module));

        let app = ModuleInfo {
            name: "App.dll".into(),
            path: "/src/App/bin/App.dll".into(),
            ..module
        };
        assert!(!PredefinedTypes::is_core_library(&app));
    }

    #[test]
    fn test_empty_cache()
    {
        let types = PredefinedTypes::default();
        assert!(!types.is_loaded());
        assert_eq!(types.decimal(), None);
        assert_eq!(types.value_class("System.Int32"), None);
    }
}
