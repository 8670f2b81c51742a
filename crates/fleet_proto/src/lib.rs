//! Generated protobuf and gRPC types for the fleet telemetry protocol.

pub mod fleet {
    pub mod v1 {
        tonic::include_proto!("fleet.v1");

        /// Encoded file descriptor set, registered with the reflection service.
        pub const FILE_DESCRIPTOR_SET: &[u8] =
            tonic::include_file_descriptor_set!("fleet_v1_descriptor");
    }
}
