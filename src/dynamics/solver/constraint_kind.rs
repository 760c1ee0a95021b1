//! The fixed menu of constraint kinds the solver understands (component
//! design §3). Every [`TypeBatchStorage`](crate::dynamics::solver::batch::TypeBatchStorage)
//! is keyed by one of these; the narrow phase and constraint graph use the
//! same enum to decide whether an existing pair-cache entry can be updated
//! in place or must be replaced (component design §4.6).

/// A constraint's kind. Each variant has its own fixed prestep/accumulated-
/// impulse/projection record shape (defined alongside its constraint struct)
/// and is monomorphized through its own [`TypeBatchStorage`](crate::dynamics::solver::batch::TypeBatchStorage)
/// rather than dispatched through a trait object, per the design notes on
/// avoiding vtables in the solver inner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_derive::ToPrimitive)]
pub enum ConstraintKind {
    BallSocket,
    Hinge,
    SwivelHinge,
    SwingLimit,
    TwistLimit,
    AngularServoMotor,
    GrabServo,
    /// Convex manifold contact, 1 to 4 points sharing one normal.
    Contact,
    /// Non-convex manifold contact, 2 to 8 points each with its own normal.
    ContactNonConvex,
}

impl ConstraintKind {
    /// All kinds, in a fixed order used to index per-kind storage (e.g. the
    /// referenced-handles accounting during activation's capacity pass,
    /// component design §4.8 step 2).
    pub const ALL: [ConstraintKind; 9] = [
        ConstraintKind::BallSocket,
        ConstraintKind::Hinge,
        ConstraintKind::SwivelHinge,
        ConstraintKind::SwingLimit,
        ConstraintKind::TwistLimit,
        ConstraintKind::AngularServoMotor,
        ConstraintKind::GrabServo,
        ConstraintKind::Contact,
        ConstraintKind::ContactNonConvex,
    ];

    pub fn index(self) -> usize {
        use num_traits::ToPrimitive;
        self.to_usize().expect("ConstraintKind always fits usize")
    }

    /// Whether this kind's constraints reference exactly one body (the
    /// other side being implicitly the immovable world). None of the kinds
    /// this crate implements are one-body; kept for symmetry with the data
    /// model's "one-body and two-body variants" wording — a one-body joint
    /// is simply a two-body joint whose second body is a static.
    pub fn is_contact(self) -> bool {
        matches!(self, ConstraintKind::Contact | ConstraintKind::ContactNonConvex)
    }
}
