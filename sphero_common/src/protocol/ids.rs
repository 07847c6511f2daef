//! Device and command identifiers.
//!
//! Inbound frames are routed through [`Command::classify`], a compile-time
//! checked `(device, command)` match table. Pairs outside the catalogue
//! classify as `None` and are logged by the caller.

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                match value {
                    $(v if v == $value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

wire_enum! {
    /// Robot subsystem addressed by a frame.
    DeviceId {
        ApiProcessor = 0x10,
        SystemInfo = 0x11,
        PowerInfo = 0x13,
        Driving = 0x16,
        Sensor = 0x18,
        UserIo = 0x1A,
    }
}

wire_enum! {
    /// Power subsystem commands and notifications.
    PowerCommand {
        DeepSleep = 0,
        Sleep = 1,
        BatteryVoltage = 3,
        Inform = 5,
        Wake = 13,
        UnknownWake = 17,
        WillSleepAsync = 25,
        SleepAsync = 26,
        Charging = 31,
        BatteryStateChange = 33,
    }
}

wire_enum! {
    /// Driving subsystem commands.
    DrivingCommand {
        RawMotor = 1,
        DriveAsRc = 2,
        DriveAsSphero = 4,
        ResetYaw = 6,
        DriveWithHeading = 7,
        TankDrive = 8,
        Stabilization = 12,
    }
}

wire_enum! {
    /// Sensor subsystem commands and notifications.
    SensorCommand {
        SensorMask = 0,
        SensorResponse = 2,
        SensorMaskExtended = 12,
        Sensor1 = 15,
        ConfigureCollision = 17,
        CollisionDetectedAsync = 18,
        ResetLocator = 19,
        EnableCollisionAsync = 20,
        Sensor2 = 23,
        CalibrateToNorth = 37,
        CompassNotify = 38,
    }
}

wire_enum! {
    /// LED matrix, audio and profile commands.
    UserIoCommand {
        PlayAudioFile = 7,
        AudioVolume = 8,
        StopAudio = 10,
        TestSound = 24,
        AllLeds = 28,
        SetUserProfile = 35,
        MatrixPixel = 45,
        MatrixColor = 47,
        ClearMatrix = 56,
        MatrixRotation = 58,
        MatrixScrollText = 59,
        MatrixScrollNotification = 60,
        MatrixLine = 61,
        MatrixFill = 62,
        PrintChar = 66,
    }
}

wire_enum! {
    /// Charging state reported in byte 1 of a charging response.
    BatteryState {
        NotCharging = 1,
        Charging = 2,
        Charged = 3,
    }
}

wire_enum! {
    /// Error codes the API processor may report.
    ApiError {
        Success = 0,
        BadDeviceId = 1,
        BadCommandId = 2,
        NotYetImplemented = 3,
        CommandIsRestricted = 4,
        BadDataLength = 5,
        CommandFailed = 6,
        BadParameterValue = 7,
        Busy = 8,
        BadTargetId = 9,
        TargetUnavailable = 10,
        Unknown = 255,
    }
}

/// A catalogued `(device, command)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Power(PowerCommand),
    Driving(DrivingCommand),
    Sensor(SensorCommand),
    UserIo(UserIoCommand),
}

impl Command {
    /// Resolve raw identifiers into a catalogued command.
    pub fn classify(device_id: u8, command_id: u8) -> Option<Self> {
        match DeviceId::try_from(device_id).ok()? {
            DeviceId::PowerInfo => PowerCommand::try_from(command_id).ok().map(Self::Power),
            DeviceId::Driving => DrivingCommand::try_from(command_id).ok().map(Self::Driving),
            DeviceId::Sensor => SensorCommand::try_from(command_id).ok().map(Self::Sensor),
            DeviceId::UserIo => UserIoCommand::try_from(command_id).ok().map(Self::UserIo),
            DeviceId::ApiProcessor | DeviceId::SystemInfo => None,
        }
    }

    pub fn device(&self) -> DeviceId {
        match self {
            Self::Power(_) => DeviceId::PowerInfo,
            Self::Driving(_) => DeviceId::Driving,
            Self::Sensor(_) => DeviceId::Sensor,
            Self::UserIo(_) => DeviceId::UserIo,
        }
    }

    pub fn command_id(&self) -> u8 {
        match *self {
            Self::Power(c) => c.into(),
            Self::Driving(c) => c.into(),
            Self::Sensor(c) => c.into(),
            Self::UserIo(c) => c.into(),
        }
    }
}
