/// The button a request originated from.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    HallUp = 0,
    HallDown = 1,
    Cab = 2,
}

impl Call {
    pub fn as_string(self) -> String {
        match self {
            Call::HallUp => String::from("hall up"),
            Call::HallDown => String::from("hall down"),
            Call::Cab => String::from("cab"),
        }
    }
}
