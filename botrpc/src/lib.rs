// ABOUTME: Generated gRPC bindings for the botrpc wire contract.
// ABOUTME: Shared by the broker, handler processes, and integration clients.

tonic::include_proto!("botrpc");
