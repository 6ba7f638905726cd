//! Convenient Macros for creating role-state nets
///
/// Creates a [`RoleStateNet`](crate::RoleStateNet).
///
/// Each tuple describes one transition: input place names, then label and weight, then output place names.
/// Places are identified by name and created on first use.
///
/// # Examples
///
/// ```rust
/// use role_state_mining::{role_state_net, RoleStateNet};
/// let net: RoleStateNet = role_state_net!(("I" ; "a", 3 ; "A"), ("A" ; "b", 1 ; "F"), ("I" ; "c", 7 ; "F"));
/// assert_eq!(net.transition_count(), 3);
/// ```
#[macro_export]
macro_rules! role_state_net {
    ( $( ( $($x:expr),* ; $label:expr, $weight:expr ; $($y:expr),* ) ),* $(,)? ) => {{
        #[allow(unused_imports)]
        use $crate::core::process_models::role_state_net::{
            Arc,
            RoleStateNetBuilder,
        };

        #[allow(unused_mut)]
        let mut builder = RoleStateNetBuilder::new();

        $(
            let transition = builder.add_transition(Some($label.to_string()), $weight as f64);
            $(
                let place = builder.ensure_place($x);
                builder.add_arc(Arc::place_to_transition(place, transition)).unwrap();
            )*
            $(
                let place = builder.ensure_place($y);
                builder.add_arc(Arc::transition_to_place(transition, place)).unwrap();
            )*
        )*

        builder.build()
    }}
}
