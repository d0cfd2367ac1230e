//! Enumerations of the standard and their canonical names.
//!
//! Every enumeration here carries its numeric code (as stored in files and used by the
//! navigation engine) and the name that is written into `C1` nodes.

use crate::prelude::*;

/// error returned when a name or numeric code does not belong to an enumeration
#[derive(Debug, Display, Constructor, Clone, PartialEq)]
#[display(fmt = "`{value}` is not a valid {enumeration}")]
pub struct UnknownName {
    enumeration: &'static str,
    value: String,
}

impl std::error::Error for UnknownName {}

macro_rules! name_table {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $( $variant:ident = $code:literal => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant = $code ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// canonical name of the value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            /// numeric code of the value
            pub fn code(&self) -> i32 {
                *self as i32
            }

            pub fn from_code(code: i64) -> Result<Self, UnknownName> {
                match code {
                    $( $code => Ok($name::$variant), )+
                    other => Err(UnknownName::new($what, other.to_string())),
                }
            }

            pub fn parse(text: &str) -> Result<Self, UnknownName> {
                let trimmed = text.trim_end_matches(|c: char| c == ' ' || c == '\0');
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == trimmed)
                    .ok_or_else(|| UnknownName::new($what, trimmed.to_string()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

name_table! {
    /// element types of a section
    ElementType, "element type" {
        Null = 0 => "ElementTypeNull",
        UserDefined = 1 => "ElementTypeUserDefined",
        Node = 2 => "NODE",
        Bar2 = 3 => "BAR_2",
        Bar3 = 4 => "BAR_3",
        Tri3 = 5 => "TRI_3",
        Tri6 = 6 => "TRI_6",
        Quad4 = 7 => "QUAD_4",
        Quad8 = 8 => "QUAD_8",
        Quad9 = 9 => "QUAD_9",
        Tetra4 = 10 => "TETRA_4",
        Tetra10 = 11 => "TETRA_10",
        Pyra5 = 12 => "PYRA_5",
        Pyra14 = 13 => "PYRA_14",
        Penta6 = 14 => "PENTA_6",
        Penta15 = 15 => "PENTA_15",
        Penta18 = 16 => "PENTA_18",
        Hexa8 = 17 => "HEXA_8",
        Hexa20 = 18 => "HEXA_20",
        Hexa27 = 19 => "HEXA_27",
        Mixed = 20 => "MIXED",
        Pyra13 = 21 => "PYRA_13",
        NGon = 22 => "NGON_n",
        NFace = 23 => "NFACE_n",
        Bar4 = 24 => "BAR_4",
        Tri9 = 25 => "TRI_9",
        Tri10 = 26 => "TRI_10",
        Quad12 = 27 => "QUAD_12",
        Quad16 = 28 => "QUAD_16",
        Tetra16 = 29 => "TETRA_16",
        Tetra20 = 30 => "TETRA_20",
        Pyra21 = 31 => "PYRA_21",
        Pyra29 = 32 => "PYRA_29",
        Pyra30 = 33 => "PYRA_30",
        Penta24 = 34 => "PENTA_24",
        Penta38 = 35 => "PENTA_38",
        Penta40 = 36 => "PENTA_40",
        Hexa32 = 37 => "HEXA_32",
        Hexa56 = 38 => "HEXA_56",
        Hexa64 = 39 => "HEXA_64",
        Bar5 = 40 => "BAR_5",
        Tri12 = 41 => "TRI_12",
        Tri15 = 42 => "TRI_15",
        QuadP4_16 = 43 => "QUAD_P4_16",
        Quad25 = 44 => "QUAD_25",
        Tetra22 = 45 => "TETRA_22",
        Tetra34 = 46 => "TETRA_34",
        Tetra35 = 47 => "TETRA_35",
        PyraP4_29 = 48 => "PYRA_P4_29",
        Pyra50 = 49 => "PYRA_50",
        Pyra55 = 50 => "PYRA_55",
        Penta33 = 51 => "PENTA_33",
        Penta66 = 52 => "PENTA_66",
        Penta75 = 53 => "PENTA_75",
        Hexa44 = 54 => "HEXA_44",
        Hexa98 = 55 => "HEXA_98",
        Hexa125 = 56 => "HEXA_125",
    }
}

impl ElementType {
    /// number of nodes of a single element, `0` for the variable sized types
    pub fn nodes_per_element(&self) -> usize {
        use ElementType::*;
        match self {
            Null | UserDefined | Mixed | NGon | NFace => 0,
            Node => 1,
            Bar2 => 2,
            Bar3 | Tri3 => 3,
            Bar4 | Quad4 | Tetra4 => 4,
            Bar5 | Pyra5 => 5,
            Tri6 | Penta6 => 6,
            Quad8 | Hexa8 => 8,
            Quad9 | Tri9 => 9,
            Tetra10 | Tri10 => 10,
            Quad12 | Tri12 => 12,
            Pyra13 => 13,
            Pyra14 => 14,
            Penta15 | Tri15 => 15,
            Quad16 | Tetra16 | QuadP4_16 => 16,
            Penta18 => 18,
            Hexa20 | Tetra20 => 20,
            Pyra21 => 21,
            Tetra22 => 22,
            Penta24 => 24,
            Quad25 => 25,
            Hexa27 => 27,
            Pyra29 | PyraP4_29 => 29,
            Pyra30 => 30,
            Hexa32 => 32,
            Penta33 => 33,
            Tetra34 => 34,
            Tetra35 => 35,
            Penta38 => 38,
            Penta40 => 40,
            Hexa44 => 44,
            Pyra50 => 50,
            Pyra55 => 55,
            Hexa56 => 56,
            Hexa64 => 64,
            Penta66 => 66,
            Penta75 => 75,
            Hexa98 => 98,
            Hexa125 => 125,
        }
    }

    /// `true` for MIXED, NGON_n and NFACE_n whose sections carry an offset array
    pub fn is_variable(&self) -> bool {
        matches!(self, ElementType::Mixed | ElementType::NGon | ElementType::NFace)
    }
}

name_table! {
    /// kinds of point sets addressing a subset of a zone
    PointSetType, "point set type" {
        Null = 0 => "PointSetTypeNull",
        UserDefined = 1 => "PointSetTypeUserDefined",
        PointList = 2 => "PointList",
        PointListDonor = 3 => "PointListDonor",
        PointRange = 4 => "PointRange",
        PointRangeDonor = 5 => "PointRangeDonor",
        ElementRange = 6 => "ElementRange",
        ElementList = 7 => "ElementList",
        CellListDonor = 8 => "CellListDonor",
    }
}

impl PointSetType {
    /// range-like sets are described by exactly two corner points
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            PointSetType::PointRange | PointSetType::PointRangeDonor | PointSetType::ElementRange
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            PointSetType::PointList
                | PointSetType::PointListDonor
                | PointSetType::ElementList
                | PointSetType::CellListDonor
        )
    }

    /// label of the node holding the points
    pub fn node_label(&self) -> &'static str {
        if self.is_range() {
            "IndexRange_t"
        } else {
            "IndexArray_t"
        }
    }
}

name_table! {
    GridLocation, "grid location" {
        Null = 0 => "GridLocationNull",
        UserDefined = 1 => "GridLocationUserDefined",
        Vertex = 2 => "Vertex",
        CellCenter = 3 => "CellCenter",
        FaceCenter = 4 => "FaceCenter",
        IFaceCenter = 5 => "IFaceCenter",
        JFaceCenter = 6 => "JFaceCenter",
        KFaceCenter = 7 => "KFaceCenter",
        EdgeCenter = 8 => "EdgeCenter",
    }
}

impl Default for GridLocation {
    fn default() -> Self {
        GridLocation::Vertex
    }
}

name_table! {
    ZoneType, "zone type" {
        Null = 0 => "ZoneTypeNull",
        UserDefined = 1 => "ZoneTypeUserDefined",
        Structured = 2 => "Structured",
        Unstructured = 3 => "Unstructured",
    }
}

name_table! {
    /// Dirichlet and Neumann are also the navigation index of a `BCData_t` node
    BcDataType, "BC data type" {
        Dirichlet = 2 => "Dirichlet",
        Neumann = 3 => "Neumann",
    }
}

impl BcDataType {
    /// name of the `BCData_t` child holding data of this kind
    pub fn node_name(&self) -> &'static str {
        match self {
            BcDataType::Dirichlet => "DirichletData",
            BcDataType::Neumann => "NeumannData",
        }
    }
}

name_table! {
    BcType, "BC type" {
        Null = 0 => "BCTypeNull",
        UserDefined = 1 => "BCTypeUserDefined",
        BCAxisymmetricWedge = 2 => "BCAxisymmetricWedge",
        BCDegenerateLine = 3 => "BCDegenerateLine",
        BCDegeneratePoint = 4 => "BCDegeneratePoint",
        BCDirichlet = 5 => "BCDirichlet",
        BCExtrapolate = 6 => "BCExtrapolate",
        BCFarfield = 7 => "BCFarfield",
        BCGeneral = 8 => "BCGeneral",
        BCInflow = 9 => "BCInflow",
        BCInflowSubsonic = 10 => "BCInflowSubsonic",
        BCInflowSupersonic = 11 => "BCInflowSupersonic",
        BCNeumann = 12 => "BCNeumann",
        BCOutflow = 13 => "BCOutflow",
        BCOutflowSubsonic = 14 => "BCOutflowSubsonic",
        BCOutflowSupersonic = 15 => "BCOutflowSupersonic",
        BCSymmetryPlane = 16 => "BCSymmetryPlane",
        BCSymmetryPolar = 17 => "BCSymmetryPolar",
        BCTunnelInflow = 18 => "BCTunnelInflow",
        BCTunnelOutflow = 19 => "BCTunnelOutflow",
        BCWall = 20 => "BCWall",
        BCWallInviscid = 21 => "BCWallInviscid",
        BCWallViscous = 22 => "BCWallViscous",
        BCWallViscousHeatFlux = 23 => "BCWallViscousHeatFlux",
        BCWallViscousIsothermal = 24 => "BCWallViscousIsothermal",
        FamilySpecified = 25 => "FamilySpecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_names_round_trip() {
        for etype in ElementType::ALL {
            assert_eq!(ElementType::parse(etype.as_str()).unwrap(), *etype);
            assert_eq!(ElementType::from_code(etype.code() as i64).unwrap(), *etype);
        }
    }

    #[test]
    fn nodes_per_element_matches_suffix() {
        assert_eq!(ElementType::Node.nodes_per_element(), 1);
        assert_eq!(ElementType::Tri3.nodes_per_element(), 3);
        assert_eq!(ElementType::QuadP4_16.nodes_per_element(), 16);
        assert_eq!(ElementType::PyraP4_29.nodes_per_element(), 29);
        assert_eq!(ElementType::Hexa125.nodes_per_element(), 125);
        assert_eq!(ElementType::Mixed.nodes_per_element(), 0);

        // every fixed type named `XXX_n` has n nodes
        for etype in ElementType::ALL {
            let digits: String = etype
                .as_str()
                .rsplit('_')
                .next()
                .unwrap_or_default()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            if let Ok(n) = digits.parse::<usize>() {
                assert_eq!(etype.nodes_per_element(), n, "{etype}");
            }
        }
    }

    #[test]
    fn out_of_range_code() {
        assert!(ElementType::from_code(57).is_err());
        assert!(PointSetType::from_code(-1).is_err());
    }

    #[test]
    fn names_ignore_padding() {
        assert_eq!(ZoneType::parse("Structured  ").unwrap(), ZoneType::Structured);
        assert_eq!(BcType::parse("BCWall").unwrap(), BcType::BCWall);
    }
}
