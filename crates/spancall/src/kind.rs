//! Call kinds and their numeric wire tags.

/// What a call request asks the host to do.
///
/// The numeric tags match the guest-side bootstrap code and must never be
/// renumbered.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Construct = 0,
    Method = 1,
    GetProp = 2,
    SetProp = 3,
    GetField = 4,
    SetField = 5,
    TypeExists = 6,
    IsEnumType = 7,
}

impl CallKind {
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(CallKind::Construct),
            1 => Some(CallKind::Method),
            2 => Some(CallKind::GetProp),
            3 => Some(CallKind::SetProp),
            4 => Some(CallKind::GetField),
            5 => Some(CallKind::SetField),
            6 => Some(CallKind::TypeExists),
            7 => Some(CallKind::IsEnumType),
            _ => None,
        }
    }

    /// True for the two pure query kinds that carry no target or args.
    pub const fn is_query(self) -> bool {
        matches!(self, CallKind::TypeExists | CallKind::IsEnumType)
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallKind::Construct => "construct",
            CallKind::Method => "method",
            CallKind::GetProp => "get-prop",
            CallKind::SetProp => "set-prop",
            CallKind::GetField => "get-field",
            CallKind::SetField => "set-field",
            CallKind::TypeExists => "type-exists",
            CallKind::IsEnumType => "is-enum-type",
        };
        write!(f, "{}", name)
    }
}
