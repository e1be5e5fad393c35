//! AWS Rekognition backend for the face-recognition abstraction.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_rekognition::operation::create_collection::CreateCollectionError;
use aws_sdk_rekognition::operation::delete_faces::DeleteFacesError;
use aws_sdk_rekognition::operation::index_faces::IndexFacesError;
use aws_sdk_rekognition::operation::search_faces_by_image::SearchFacesByImageError;
use aws_sdk_rekognition::types::{Image, S3Object};
use aws_sdk_rekognition::Client as RekognitionClient;

use crate::traits::{
    CollectionStatus, FaceHit, FaceIndex, RecognitionError, RecognitionResult,
};

/// Face index backed by AWS Rekognition collections.
///
/// Object keys are resolved against a single S3 bucket; Rekognition reads
/// the images directly from S3, so nothing is downloaded through this
/// process.
#[derive(Clone)]
pub struct RekognitionFaceIndex {
    client: RekognitionClient,
    bucket: String,
}

impl RekognitionFaceIndex {
    /// Build a client for the given region and bucket.
    pub async fn new(region: &str, bucket: String) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: RekognitionClient::new(&config),
            bucket,
        }
    }

    pub fn from_client(client: RekognitionClient, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn s3_image(&self, object_key: &str) -> Image {
        Image::builder()
            .s3_object(
                S3Object::builder()
                    .bucket(self.bucket.clone())
                    .name(object_key)
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl FaceIndex for RekognitionFaceIndex {
    async fn create_collection(&self, collection_id: &str) -> RecognitionResult<CollectionStatus> {
        match self
            .client
            .create_collection()
            .collection_id(collection_id)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(collection_id = %collection_id, "Created face collection");
                Ok(CollectionStatus::Created)
            }
            Err(e) => {
                let err: CreateCollectionError = e.into_service_error();
                if err.is_resource_already_exists_exception() {
                    Ok(CollectionStatus::AlreadyExists)
                } else if err.is_provisioned_throughput_exceeded_exception()
                    || err.is_throttling_exception()
                {
                    Err(RecognitionError::Throttled(err.to_string()))
                } else {
                    Err(RecognitionError::Service(err.to_string()))
                }
            }
        }
    }

    async fn index_image(
        &self,
        collection_id: &str,
        object_key: &str,
        external_image_id: &str,
    ) -> RecognitionResult<Vec<String>> {
        let response = self
            .client
            .index_faces()
            .collection_id(collection_id)
            .image(self.s3_image(object_key))
            .external_image_id(external_image_id)
            .send()
            .await
            .map_err(|e| {
                let err: IndexFacesError = e.into_service_error();
                if err.is_provisioned_throughput_exceeded_exception()
                    || err.is_throttling_exception()
                {
                    RecognitionError::Throttled(err.to_string())
                } else if err.is_resource_not_found_exception() {
                    RecognitionError::CollectionNotFound(collection_id.to_string())
                } else if err.is_invalid_image_format_exception()
                    || err.is_image_too_large_exception()
                    || err.is_invalid_s3_object_exception()
                {
                    RecognitionError::InvalidImage(err.to_string())
                } else {
                    RecognitionError::Service(err.to_string())
                }
            })?;

        let face_ids: Vec<String> = response
            .face_records()
            .iter()
            .filter_map(|record| record.face())
            .filter_map(|face| face.face_id().map(str::to_string))
            .collect();

        tracing::debug!(
            collection_id = %collection_id,
            key = %object_key,
            faces = face_ids.len(),
            "Indexed image"
        );

        Ok(face_ids)
    }

    async fn search_by_image(
        &self,
        collection_id: &str,
        object_key: &str,
        max_results: u32,
        min_similarity: f32,
    ) -> RecognitionResult<Vec<FaceHit>> {
        let response = self
            .client
            .search_faces_by_image()
            .collection_id(collection_id)
            .image(self.s3_image(object_key))
            .max_faces(max_results as i32)
            .face_match_threshold(min_similarity)
            .send()
            .await
            .map_err(|e| {
                let err: SearchFacesByImageError = e.into_service_error();
                if err.is_provisioned_throughput_exceeded_exception()
                    || err.is_throttling_exception()
                {
                    RecognitionError::Throttled(err.to_string())
                } else if err.is_resource_not_found_exception() {
                    RecognitionError::CollectionNotFound(collection_id.to_string())
                } else if err.is_invalid_image_format_exception()
                    || err.is_image_too_large_exception()
                    || err.is_invalid_s3_object_exception()
                {
                    RecognitionError::InvalidImage(err.to_string())
                } else {
                    RecognitionError::Service(err.to_string())
                }
            })?;

        let hits = response
            .face_matches()
            .iter()
            .map(|m| FaceHit {
                external_image_id: m
                    .face()
                    .and_then(|f| f.external_image_id())
                    .map(str::to_string),
                similarity: m.similarity().unwrap_or(0.0),
                face_id: m.face().and_then(|f| f.face_id()).map(str::to_string),
            })
            .collect();

        Ok(hits)
    }

    async fn delete_faces(
        &self,
        collection_id: &str,
        face_ids: &[String],
    ) -> RecognitionResult<()> {
        if face_ids.is_empty() {
            return Ok(());
        }

        self.client
            .delete_faces()
            .collection_id(collection_id)
            .set_face_ids(Some(face_ids.to_vec()))
            .send()
            .await
            .map_err(|e| {
                let err: DeleteFacesError = e.into_service_error();
                if err.is_resource_not_found_exception() {
                    RecognitionError::CollectionNotFound(collection_id.to_string())
                } else if err.is_provisioned_throughput_exceeded_exception()
                    || err.is_throttling_exception()
                {
                    RecognitionError::Throttled(err.to_string())
                } else {
                    RecognitionError::Service(err.to_string())
                }
            })?;

        Ok(())
    }
}
