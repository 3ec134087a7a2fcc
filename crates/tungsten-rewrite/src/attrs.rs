use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Evaluation-controlling tags on a symbol.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Attributes: u32 {
        const ORDERLESS         = 1 << 0;
        const FLAT              = 1 << 1;
        const LISTABLE          = 1 << 2;
        const ONE_IDENTITY      = 1 << 3;
        const PROTECTED         = 1 << 4;
        const READ_PROTECTED    = 1 << 5;
        const HOLD_FIRST        = 1 << 6;
        const HOLD_REST         = 1 << 7;
        const HOLD_ALL          = 1 << 8;
        const HOLD_ALL_COMPLETE = 1 << 9;
        const NHOLD_ALL         = 1 << 10;
        const NHOLD_FIRST       = 1 << 11;
        const NHOLD_REST        = 1 << 12;
        const SEQUENCE_HOLD     = 1 << 13;
        const CONSTANT          = 1 << 14;
        const LOCKED            = 1 << 15;
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::empty()
    }
}

impl Attributes {
    /// Leaf 1 is held.
    pub fn holds_first(&self) -> bool {
        self.intersects(
            Attributes::HOLD_FIRST | Attributes::HOLD_ALL | Attributes::HOLD_ALL_COMPLETE,
        )
    }

    /// Leaves 2.. are held.
    pub fn holds_rest(&self) -> bool {
        self.intersects(
            Attributes::HOLD_REST | Attributes::HOLD_ALL | Attributes::HOLD_ALL_COMPLETE,
        )
    }

    /// True when `Sequence[...]` leaves must not be spliced.
    pub fn holds_sequences(&self) -> bool {
        self.intersects(Attributes::SEQUENCE_HOLD | Attributes::HOLD_ALL_COMPLETE)
    }

    /// Wolfram-style attribute name to flag. Distinct from the generated
    /// `from_name`, which parses the Rust constant identifiers.
    pub fn from_attribute_name(name: &str) -> Option<Attributes> {
        Some(match name {
            "Orderless" => Attributes::ORDERLESS,
            "Flat" => Attributes::FLAT,
            "Listable" => Attributes::LISTABLE,
            "OneIdentity" => Attributes::ONE_IDENTITY,
            "Protected" => Attributes::PROTECTED,
            "ReadProtected" => Attributes::READ_PROTECTED,
            "HoldFirst" => Attributes::HOLD_FIRST,
            "HoldRest" => Attributes::HOLD_REST,
            "HoldAll" => Attributes::HOLD_ALL,
            "HoldAllComplete" => Attributes::HOLD_ALL_COMPLETE,
            "NHoldAll" => Attributes::NHOLD_ALL,
            "NHoldFirst" => Attributes::NHOLD_FIRST,
            "NHoldRest" => Attributes::NHOLD_REST,
            "SequenceHold" => Attributes::SEQUENCE_HOLD,
            "Constant" => Attributes::CONSTANT,
            "Locked" => Attributes::LOCKED,
            _ => return None,
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        const TABLE: &[(Attributes, &str)] = &[
            (Attributes::ORDERLESS, "Orderless"),
            (Attributes::FLAT, "Flat"),
            (Attributes::LISTABLE, "Listable"),
            (Attributes::ONE_IDENTITY, "OneIdentity"),
            (Attributes::PROTECTED, "Protected"),
            (Attributes::READ_PROTECTED, "ReadProtected"),
            (Attributes::HOLD_FIRST, "HoldFirst"),
            (Attributes::HOLD_REST, "HoldRest"),
            (Attributes::HOLD_ALL, "HoldAll"),
            (Attributes::HOLD_ALL_COMPLETE, "HoldAllComplete"),
            (Attributes::NHOLD_ALL, "NHoldAll"),
            (Attributes::NHOLD_FIRST, "NHoldFirst"),
            (Attributes::NHOLD_REST, "NHoldRest"),
            (Attributes::SEQUENCE_HOLD, "SequenceHold"),
            (Attributes::CONSTANT, "Constant"),
            (Attributes::LOCKED, "Locked"),
        ];
        TABLE
            .iter()
            .filter(|(a, _)| self.contains(*a))
            .map(|(_, n)| *n)
            .collect()
    }
}
