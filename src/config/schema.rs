//! Struct descriptions consumed by the flag generator.
//!
//! A [`Configurable`] type lists its fields as [`Field`]s. Each field carries
//! its tag annotations and a [`Lens`] onto its storage, so flags read and write
//! the original struct directly. The [`configurable!`](crate::configurable)
//! macro writes the description for plain structs.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::mpsc::{Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use super::value::{Adapter, FlagKind};

/// A struct whose fields can be bound to flags.
pub trait Configurable: Sized + 'static {
    fn schema() -> Schema<Self>;
}

/// The description of a configurable type.
pub enum Schema<T> {
    /// A struct with its fields in declaration order.
    Struct(Vec<Field<T>>),
    /// Anything that is not a struct, named for error reporting.
    Opaque(&'static str),
}

impl<T: 'static> Schema<T> {
    /// Re-roots every field description onto an enclosing type.
    pub(crate) fn lift<R: 'static>(self, outer: &Lens<R, T>) -> Schema<R> {
        match self {
            Self::Struct(fields) => {
                Schema::Struct(fields.into_iter().map(|f| f.lift(outer)).collect())
            }
            Self::Opaque(name) => Schema::Opaque(name),
        }
    }
}

/// Annotations attached to a field, looked up by key (`name`, `short`,
/// `description`, or any custom name key).
#[derive(Debug, Clone, Copy, Default)]
pub struct Tags(&'static [(&'static str, &'static str)]);

impl Tags {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self(pairs)
    }

    /// Returns the value for `key`; an empty value counts as absent.
    pub fn get(&self, key: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .filter(|v| !v.is_empty())
    }
}

/// Shared accessors from a root value `T` to one of its parts `V`.
pub struct Lens<T, V> {
    get: Arc<dyn Fn(&T) -> &V + Send + Sync>,
    get_mut: Arc<dyn Fn(&mut T) -> &mut V + Send + Sync>,
}

impl<T: 'static, V: 'static> Lens<T, V> {
    pub fn new(get: fn(&T) -> &V, get_mut: fn(&mut T) -> &mut V) -> Self {
        Self {
            get: Arc::new(get),
            get_mut: Arc::new(get_mut),
        }
    }

    pub fn get<'a>(&self, root: &'a T) -> &'a V {
        (self.get)(root)
    }

    pub fn get_mut<'a>(&self, root: &'a mut T) -> &'a mut V {
        (self.get_mut)(root)
    }

    /// Composes this lens with one reaching further into `V`.
    pub fn then<W: 'static>(&self, inner: &Lens<V, W>) -> Lens<T, W> {
        let (outer_get, inner_get) = (Arc::clone(&self.get), Arc::clone(&inner.get));
        let (outer_mut, inner_mut) = (Arc::clone(&self.get_mut), Arc::clone(&inner.get_mut));
        Lens {
            get: Arc::new(by_ref::<T, W, _>(move |root: &T| inner_get(outer_get(root)))),
            get_mut: Arc::new(by_mut::<T, W, _>(move |root: &mut T| {
                inner_mut(outer_mut(root))
            })),
        }
    }
}

impl<T, V> Clone for Lens<T, V> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            get_mut: Arc::clone(&self.get_mut),
        }
    }
}

fn by_ref<T, V, F>(f: F) -> F
where
    F: Fn(&T) -> &V,
{
    f
}

fn by_mut<T, V, F>(f: F) -> F
where
    F: Fn(&mut T) -> &mut V,
{
    f
}

/// Read/write access to one bound field, with its concrete type erased.
pub(crate) trait Accessor<T>: Send + Sync {
    fn render(&self, root: &T) -> String;

    fn assign(&self, root: &mut T, text: &str) -> Result<(), String>;
}

struct Bound<T, V> {
    lens: Lens<T, V>,
    adapter: Adapter<V>,
}

impl<T: 'static, V: 'static> Accessor<T> for Bound<T, V> {
    fn render(&self, root: &T) -> String {
        self.adapter.render(self.lens.get(root))
    }

    fn assign(&self, root: &mut T, text: &str) -> Result<(), String> {
        self.adapter.assign(self.lens.get_mut(root), text)
    }
}

struct Lifted<T, S> {
    outer: Lens<T, S>,
    inner: Arc<dyn Accessor<S>>,
}

impl<T: 'static, S: 'static> Accessor<T> for Lifted<T, S> {
    fn render(&self, root: &T) -> String {
        self.inner.render(self.outer.get(root))
    }

    fn assign(&self, root: &mut T, text: &str) -> Result<(), String> {
        self.inner.assign(self.outer.get_mut(root), text)
    }
}

/// How the flag generator treats a field type.
pub enum Shape<V> {
    /// A scalar or collection bound as a single flag.
    Value(Adapter<V>),
    /// A nested struct; its fields become flags under the field's path.
    Nested(fn() -> Schema<V>),
    /// Accepted without producing a flag (string to string-list maps).
    Ignored,
    UnsupportedSlice,
    UnsupportedMap,
    Unsupported,
}

/// Implemented by every type that may appear as a field of a
/// [`Configurable`] struct.
pub trait FieldType: Sized + 'static {
    fn shape() -> Shape<Self>;
}

pub(crate) enum FieldKind<T> {
    Value {
        kind: FlagKind,
        accessor: Arc<dyn Accessor<T>>,
    },
    Nested(Arc<dyn Fn() -> Schema<T> + Send + Sync>),
    Ignored,
    UnsupportedSlice(&'static str),
    UnsupportedMap(&'static str),
    Unsupported(&'static str),
}

/// One field of a [`Configurable`] struct.
pub struct Field<T> {
    ident: &'static str,
    tags: Tags,
    exported: bool,
    kind: FieldKind<T>,
}

impl<T: 'static> Field<T> {
    pub fn new<V: FieldType>(ident: &'static str, tags: Tags, lens: Lens<T, V>) -> Self {
        let ty = type_name::<V>();
        let kind = match V::shape() {
            Shape::Value(adapter) => FieldKind::Value {
                kind: adapter.kind(),
                accessor: Arc::new(Bound { lens, adapter }),
            },
            Shape::Nested(schema) => {
                FieldKind::Nested(Arc::new(move || schema().lift(&lens)))
            }
            Shape::Ignored => FieldKind::Ignored,
            Shape::UnsupportedSlice => FieldKind::UnsupportedSlice(ty),
            Shape::UnsupportedMap => FieldKind::UnsupportedMap(ty),
            Shape::Unsupported => FieldKind::Unsupported(ty),
        };
        Self {
            ident,
            tags,
            exported: true,
            kind,
        }
    }

    /// Marks the field as private; private fields never become flags.
    #[must_use]
    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    pub fn tags(&self) -> Tags {
        self.tags
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub(crate) fn kind(&self) -> &FieldKind<T> {
        &self.kind
    }

    fn lift<R: 'static>(self, outer: &Lens<R, T>) -> Field<R> {
        let kind = match self.kind {
            FieldKind::Value { kind, accessor } => FieldKind::Value {
                kind,
                accessor: Arc::new(Lifted {
                    outer: outer.clone(),
                    inner: accessor,
                }),
            },
            FieldKind::Nested(schema) => {
                let outer = outer.clone();
                FieldKind::Nested(Arc::new(move || schema().lift(&outer)))
            }
            FieldKind::Ignored => FieldKind::Ignored,
            FieldKind::UnsupportedSlice(ty) => FieldKind::UnsupportedSlice(ty),
            FieldKind::UnsupportedMap(ty) => FieldKind::UnsupportedMap(ty),
            FieldKind::Unsupported(ty) => FieldKind::Unsupported(ty),
        };
        Field {
            ident: self.ident,
            tags: self.tags,
            exported: self.exported,
            kind,
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("ident", &self.ident)
            .field("tags", &self.tags)
            .field("exported", &self.exported)
            .finish_non_exhaustive()
    }
}

macro_rules! scalar_field_type {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn shape() -> Shape<Self> {
                    Shape::Value(Adapter::of())
                }
            }
        )*
    };
}

scalar_field_type!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, Duration);

impl<E: 'static> FieldType for Vec<E> {
    fn shape() -> Shape<Self> {
        let element = TypeId::of::<E>();
        if element == TypeId::of::<String>() {
            Shape::Value(Adapter::erased::<Vec<String>>())
        } else if element == TypeId::of::<i64>() {
            Shape::Value(Adapter::erased::<Vec<i64>>())
        } else {
            Shape::UnsupportedSlice
        }
    }
}

impl<K: 'static, V: 'static> FieldType for HashMap<K, V> {
    fn shape() -> Shape<Self> {
        map_shape::<K, V, _>(Adapter::erased::<HashMap<String, String>>)
    }
}

impl<K: 'static, V: 'static> FieldType for BTreeMap<K, V> {
    fn shape() -> Shape<Self> {
        map_shape::<K, V, _>(Adapter::erased::<BTreeMap<String, String>>)
    }
}

fn map_shape<K: 'static, V: 'static, M>(string_map: fn() -> Adapter<M>) -> Shape<M> {
    if TypeId::of::<K>() != TypeId::of::<String>() {
        return Shape::UnsupportedMap;
    }
    let value = TypeId::of::<V>();
    if value == TypeId::of::<String>() {
        Shape::Value(string_map())
    } else if value == TypeId::of::<Vec<String>>() {
        // No flag representation exists for string to string-list maps; the
        // field is still filled from the config file.
        Shape::Ignored
    } else {
        Shape::UnsupportedMap
    }
}

macro_rules! unsupported_field_type {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn shape() -> Shape<Self> {
                    Shape::Unsupported
                }
            }
        )*
    };
}

unsupported_field_type!(
    Box<dyn Any + Send + Sync>,
    Box<dyn Fn() + Send + Sync>,
    fn(),
);

impl<M: 'static> FieldType for Sender<M> {
    fn shape() -> Shape<Self> {
        Shape::Unsupported
    }
}

impl<M: 'static> FieldType for SyncSender<M> {
    fn shape() -> Shape<Self> {
        Shape::Unsupported
    }
}

impl<M: 'static> FieldType for Receiver<M> {
    fn shape() -> Shape<Self> {
        Shape::Unsupported
    }
}

/// Declares a struct and implements [`Configurable`] and [`FieldType`] for it.
///
/// Each field name may be followed by `[key: "value", ...]` annotations. The
/// flag name is read from the `name` key unless the manager is built with a
/// different name key; `short` and `description` supply the one-letter alias
/// and the help text. Fields without any visibility modifier are private and
/// never become flags.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// bindery::configurable! {
///     #[derive(Debug, Default, Serialize, Deserialize)]
///     pub struct Server {
///         pub host [name: "host", description: "Server host"]: String,
///         pub port [name: "port", short: "p"]: i64,
///         pub labels: Vec<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! configurable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident
                $([ $($key:ident : $value:literal),* $(,)? ])?
                : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::config::Configurable for $name {
            fn schema() -> $crate::config::Schema<Self> {
                $crate::config::Schema::Struct(::std::vec![
                    $(
                        $crate::config::Field::new(
                            ::std::stringify!($field),
                            $crate::config::Tags::new(&[
                                $($( (::std::stringify!($key), $value) ),*)?
                            ]),
                            $crate::config::Lens::new(
                                {
                                    fn get(root: &$name) -> &$ty {
                                        &root.$field
                                    }
                                    get
                                },
                                {
                                    fn get_mut(root: &mut $name) -> &mut $ty {
                                        &mut root.$field
                                    }
                                    get_mut
                                },
                            ),
                        )
                        .exported(!::std::stringify!($field_vis).is_empty()),
                    )*
                ])
            }
        }

        impl $crate::config::FieldType for $name {
            fn shape() -> $crate::config::Shape<Self> {
                $crate::config::Shape::Nested(
                    <Self as $crate::config::Configurable>::schema,
                )
            }
        }
    };
}
