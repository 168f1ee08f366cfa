/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Convenience macros

/// Macro to produce an array of [`VertexAttribute`](crate::VertexAttribute).
///
/// Output has type: `[VertexAttribute; _]`. Usage is as follows:
/// ```
/// # use gfx_port::vertex_attr_array;
/// let attrs = vertex_attr_array![0 => Float32x2, 1 => Float32, 2 => Uint16x4];
/// ```
/// Offsets are calculated automatically from the formats, tightly packed.
#[macro_export]
macro_rules! vertex_attr_array {
    ($($loc:expr => $fmt:ident),* $(,)?) => {
        $crate::vertex_attr_array!([] ; 0; $($loc => $fmt ,)*)
    };
    ([$($t:expr,)*] ; $off:expr ;) => { [$($t,)*] };
    ([$($t:expr,)*] ; $off:expr ; $loc:expr => $item:ident, $($ll:expr => $ii:ident ,)*) => {
        $crate::vertex_attr_array!(
            [$($t,)*
            $crate::VertexAttribute {
                format: $crate::VertexFormat :: $item,
                offset: $off,
                shader_location: $loc,
            },];
            $off + $crate::VertexFormat :: $item.size();
            $($ll => $ii ,)*
        )
    };
}

/// Declares an immutable pipeline state object wrapping a descriptor,
/// identified by a device-unique [`ObjectId`](crate::ObjectId).
macro_rules! state_object {
    ($(#[$meta:meta])* $name:ident => $desc:ty) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            id: $crate::ObjectId,
            desc: $desc,
        }

        impl $name {
            pub(crate) fn new(id: $crate::ObjectId, desc: $desc) -> Self {
                Self { id, desc }
            }

            pub fn id(&self) -> $crate::ObjectId {
                self.id
            }

            pub fn description(&self) -> &$desc {
                &self.desc
            }
        }
    };
}

#[test]
fn test_vertex_attr_array() {
    let attrs = vertex_attr_array![0 => Float32x2, 3 => Uint16x4, 4 => Float32x3];
    assert_eq!(attrs.len(), 3);
    assert_eq!(attrs[0].offset, 0);
    assert_eq!(attrs[0].shader_location, 0);
    assert_eq!(attrs[1].offset, 8);
    assert_eq!(attrs[1].shader_location, 3);
    assert_eq!(attrs[2].offset, 16);
}
