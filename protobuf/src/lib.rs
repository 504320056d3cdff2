tonic::include_proto!("streamjobprovider");
