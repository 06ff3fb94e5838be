use std::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub(crate) fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw identifier, unique within the owning context.
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Device-side allocation backing a [`GeometryResource`](crate::GeometryResource).
    GeometryHandle,
    "geometry"
);
define_handle!(
    /// Device-side allocation backing a [`TextureResource`](crate::TextureResource).
    ///
    /// Texture identity for unit allocation is this handle, never the pixel contents.
    TextureHandle,
    "texture"
);
define_handle!(
    /// Linked program registered with a [`Context`](crate::Context).
    ProgramHandle,
    "program"
);
